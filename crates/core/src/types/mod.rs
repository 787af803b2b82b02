//! Domain types for Earmark
//!
//! - `book`: the audiobook position model
//! - `common`: shared value types and the `Validator` trait

mod book;
mod common;

pub use book::{AudioBook, BookFile, BookId, BookPosition, MissingDurations};
pub use common::{Duration, Timestamp, Validator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_are_exported() {
        let _book_id: BookId = BookId::new();
        let _position = BookPosition::default();
        let _duration = Duration::ZERO;
    }
}
