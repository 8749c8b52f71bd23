use bson::Bson;
use std::borrow::Cow;

use crate::ast::Field;

/// Longest dotted path we are willing to walk.
pub const MAX_PATH_DEPTH: usize = 64;

/// Resolve `field` against `value`.
///
/// Dotted paths walk nested documents. A non-numeric segment applied to an array
/// collects that key from every element (splicing nested arrays), so `tags.name`
/// on `{tags: [{name: "a"}, {name: "b"}]}` yields `["a", "b"]`. Numeric segments
/// index into arrays. `None` means the path does not exist.
pub fn get_value<'a>(value: &'a Bson, field: &Field) -> Option<Cow<'a, Bson>> {
    match field {
        Field::Itself => Some(Cow::Borrowed(value)),
        Field::Named(path) => get_path(value, path),
    }
}

pub fn get_path<'a>(value: &'a Bson, path: &str) -> Option<Cow<'a, Bson>> {
    let mut current = Cow::Borrowed(value);
    for (depth, segment) in path.split('.').enumerate() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        current = match current {
            Cow::Borrowed(v) => get_field(v, segment)?,
            Cow::Owned(v) => Cow::Owned(get_field(&v, segment)?.into_owned()),
        };
    }
    Some(current)
}

fn get_field<'a>(value: &'a Bson, segment: &str) -> Option<Cow<'a, Bson>> {
    match value {
        Bson::Document(doc) => doc.get(segment).map(Cow::Borrowed),
        Bson::Array(items) => match segment.parse::<usize>() {
            Ok(index) => items.get(index).map(Cow::Borrowed),
            Err(_) => {
                let mut collected = Vec::new();
                for item in items {
                    match get_field(item, segment).map(Cow::into_owned) {
                        Some(Bson::Array(nested)) => collected.extend(nested),
                        Some(found) => collected.push(found),
                        None => {}
                    }
                }
                Some(Cow::Owned(Bson::Array(collected)))
            }
        },
        _ => None,
    }
}
