use bson::{Bson, doc};
use querycast::ast::{CompoundCondition, Condition, Field, FieldCondition, ITSELF, Operand, Pattern};
use querycast::errors::QueryError;
use querycast::mongo::{self, parse_json};
use querycast::parse::{IGNORE, Level, ObjectQueryParser};

fn field(op: &str, name: impl Into<Field>, value: impl Into<Operand>) -> Condition {
    FieldCondition::new(op, name, value).into()
}

fn compound(op: &str, children: Vec<Condition>) -> Condition {
    CompoundCondition::new(op, children).into()
}

#[test]
fn plain_value_uses_eq() {
    assert_eq!(parse_json(r#"{"name": "ann"}"#).unwrap(), field("eq", "name", "ann"));
}

#[test]
fn multiple_keys_are_and_ed_in_order() {
    let ast = parse_json(r#"{"b": 1, "a": {"$gt": 2, "$lt": 5}}"#).unwrap();
    let expected = compound(
        "and",
        vec![field("eq", "b", 1), field("gt", "a", 2), field("lt", "a", 5)],
    );
    assert_eq!(ast, expected);
}

#[test]
fn nested_objects_flatten_to_dot_paths() {
    let ast = parse_json(r#"{"address": {"city": "Kyiv", "geo": {"lat": {"$gte": 10}}}}"#).unwrap();
    let expected = compound(
        "and",
        vec![field("eq", "address.city", "Kyiv"), field("gte", "address.geo.lat", 10)],
    );
    assert_eq!(ast, expected);
}

#[test]
fn and_or_are_flattened() {
    let ast = parse_json(r#"{"$and": [{"a": 1}, {"$and": [{"b": 2}, {"c": 3}]}]}"#).unwrap();
    let expected = compound("and", vec![field("eq", "a", 1), field("eq", "b", 2), field("eq", "c", 3)]);
    assert_eq!(ast, expected);

    let ast = parse_json(r#"{"$or": [{"a": 1}]}"#).unwrap();
    assert_eq!(ast, field("eq", "a", 1));
}

#[test]
fn top_level_and_merges_with_siblings() {
    let ast = parse_json(r#"{"$and": [{"a": 1}, {"b": 2}], "c": 3}"#).unwrap();
    let expected = compound("and", vec![field("eq", "a", 1), field("eq", "b", 2), field("eq", "c", 3)]);
    assert_eq!(ast, expected);
}

#[test]
fn nor_keeps_its_children() {
    let ast = parse_json(r#"{"$nor": [{"a": 1}, {"b": 2}]}"#).unwrap();
    assert_eq!(ast, compound("nor", vec![field("eq", "a", 1), field("eq", "b", 2)]));
}

#[test]
fn not_wraps_field_operators() {
    let ast = parse_json(r#"{"age": {"$not": {"$gt": 5, "$lt": 1}}}"#).unwrap();
    let expected = compound(
        "not",
        vec![compound("and", vec![field("gt", "age", 5), field("lt", "age", 1)])],
    );
    assert_eq!(ast, expected);
}

#[test]
fn elem_match_with_nested_query() {
    let ast = parse_json(r#"{"projects": {"$elemMatch": {"active": true, "count": {"$gt": 1}}}}"#).unwrap();
    let nested = compound("and", vec![field("eq", "active", true), field("gt", "count", 1)]);
    assert_eq!(ast, field("elemMatch", "projects", nested));
}

#[test]
fn elem_match_with_operators_targets_itself() {
    let ast = parse_json(r#"{"scores": {"$elemMatch": {"$gte": 80}}}"#).unwrap();
    assert_eq!(ast, field("elemMatch", "scores", field("gte", ITSELF, 80)));
}

#[test]
fn regex_takes_sibling_options() {
    let ast = parse_json(r#"{"email": {"$regex": "@example\\.com$", "$options": "i"}}"#).unwrap();
    assert_eq!(ast, field("regex", "email", Pattern::new("@example\\.com$", "i")));

    let ast = parse_json(r#"{"email": {"$regex": "^a"}}"#).unwrap();
    assert_eq!(ast, field("regex", "email", Pattern::new("^a", "")));
}

#[test]
fn validators_reject_bad_operands() {
    let cases = [
        (r#"{"$and": []}"#, "and"),
        (r#"{"$or": {"a": 1}}"#, "or"),
        (r#"{"a": {"$in": 1}}"#, "in"),
        (r#"{"a": {"$all": "x"}}"#, "all"),
        (r#"{"a": {"$size": "2"}}"#, "size"),
        (r#"{"a": {"$mod": [1]}}"#, "mod"),
        (r#"{"a": {"$mod": [1, "x"]}}"#, "mod"),
        (r#"{"a": {"$exists": 1}}"#, "exists"),
        (r#"{"a": {"$gt": true}}"#, "gt"),
        (r#"{"a": {"$lte": [1]}}"#, "lte"),
        (r#"{"a": {"$regex": 5}}"#, "regex"),
        (r#"{"a": {"$not": 5}}"#, "not"),
        (r#"{"a": {"$elemMatch": [1]}}"#, "elemMatch"),
    ];
    for (query, operator) in cases {
        match parse_json(query) {
            Err(QueryError::Validation { operator: op, .. }) => assert_eq!(op, operator, "{query}"),
            other => panic!("expected validation error for {query}, got {other:?}"),
        }
    }
}

#[test]
fn validation_messages_name_the_operator() {
    let err = parse_json(r#"{"a": {"$in": 1}}"#).unwrap_err();
    assert_eq!(err.to_string(), "\"in\" expects value to be an array");
    let err = parse_json(r#"{"$and": []}"#).unwrap_err();
    assert_eq!(err.to_string(), "\"and\" expects to have at least one element in array");
}

#[test]
fn unknown_dollar_operators_are_rejected() {
    let err = parse_json(r#"{"$where": "this.a > 1"}"#).unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedOperator(op) if op == "$where"));

    let err = parse_json(r#"{"a": {"$near": [1, 2]}}"#).unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedOperator(op) if op == "$near"));
}

#[test]
fn level_mismatch_is_reported() {
    let err = parse_json(r#"{"$gt": 5}"#).unwrap_err();
    assert!(matches!(
        err,
        QueryError::UnexpectedLevel { ref operator, level: Level::Field, position: Level::Document }
            if operator == "$gt"
    ));

    let err = parse_json(r#"{"a": {"$and": [{"b": 1}]}}"#).unwrap_err();
    assert!(matches!(err, QueryError::UnexpectedLevel { level: Level::Compound, position: Level::Field, .. }));
}

#[test]
fn empty_query_is_empty_and() {
    assert_eq!(parse_json("{}").unwrap(), compound("and", vec![]));
}

#[test]
fn non_object_query_is_rejected() {
    assert!(matches!(parse_json("[1]"), Err(QueryError::InvalidQuery(_))));
    assert!(matches!(parse_json("{"), Err(QueryError::Json(_))));
}

#[test]
fn ignore_marker_makes_keys_vacuous() {
    let parser = ObjectQueryParser::new(mongo::instructions(), mongo::parser_options().with_ignore());

    let ast = parser.parse(&doc! { "a": 1, "b": IGNORE }).unwrap();
    assert_eq!(ast, field("eq", "a", 1));

    let ast = parser.parse(&doc! { "a": { "$gt": IGNORE, "$lt": 5 } }).unwrap();
    assert_eq!(ast, field("lt", "a", 5));

    let ast = parser.parse(&doc! { "$or": [IGNORE, { "a": 1 }] }).unwrap();
    assert_eq!(ast, field("eq", "a", 1));

    let ast = parser.parse(&doc! { "$or": [IGNORE], "b": 2 }).unwrap();
    assert_eq!(ast, field("eq", "b", 2));

    let ast = parser.parse(&doc! { "a": IGNORE }).unwrap();
    assert_eq!(ast, compound("and", vec![]));
}

#[test]
fn ignore_marker_is_a_value_when_disabled() {
    let ast = mongo::parse(&doc! { "a": Bson::Undefined }).unwrap();
    assert_eq!(ast, field("eq", "a", Bson::Undefined));
}

#[test]
fn not_over_only_ignored_operators_is_dropped() {
    let parser = ObjectQueryParser::new(mongo::instructions(), mongo::parser_options().with_ignore());
    let ast = parser.parse(&doc! { "age": { "$not": { "$gt": IGNORE } }, "name": "a" }).unwrap();
    assert_eq!(ast, field("eq", "name", "a"));

    let sql = querycast::sql::to_sql(&ast, querycast::sql::SqlOptions::default()).unwrap();
    assert_eq!(sql.sql, "\"name\" = $1");
    let person = Bson::Document(doc! { "name": "a", "age": 5 });
    assert!(querycast::matcher::default_operators().interpret(&ast, &person).unwrap());

    let ast = parser.parse(&doc! { "age": { "$not": { "$gt": IGNORE, "$lt": 3 } } }).unwrap();
    assert_eq!(ast, compound("not", vec![field("lt", "age", 3)]));
}

#[test]
fn regex_accepts_bson_regular_expressions() {
    let regex = bson::Regex { pattern: "^A".try_into().unwrap(), options: "i".try_into().unwrap() };
    let ast = mongo::parse(&doc! { "name": { "$regex": Bson::RegularExpression(regex.clone()) } }).unwrap();
    assert_eq!(ast, field("regex", "name", Pattern::new("^A", "i")));

    let ast = mongo::parse(&doc! { "name": { "$not": Bson::RegularExpression(regex) } }).unwrap();
    assert_eq!(ast, compound("not", vec![field("regex", "name", Pattern::new("^A", "i"))]));
}

#[cfg(feature = "regex")]
#[test]
fn negated_bson_regex_matches_documents() {
    let regex = bson::Regex { pattern: "^a".try_into().unwrap(), options: "i".try_into().unwrap() };
    let query = doc! { "name": { "$not": Bson::RegularExpression(regex) } };
    let filter = querycast::matcher::filter(&query).unwrap();
    assert!(!filter.matches_document(&doc! { "name": "Ann" }).unwrap());
    assert!(filter.matches_document(&doc! { "name": "Bob" }).unwrap());
}
