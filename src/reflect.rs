//! Field-level reflection.
//!
//! `#[derive(Reflect)]` on a struct lists its fields in declaration order and lets
//! generic code visit them without knowing the type. Fields marked
//! `#[tessera(skip)]` are invisible here, as they are to archiving.
//!
//! ```
//! use tessera::{FieldVisitor, Reflect};
//!
//! #[derive(Reflect)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! struct Names(Vec<&'static str>);
//!
//! impl FieldVisitor for Names {
//!     fn visit<F: 'static>(&mut self, name: &'static str, _: &F) {
//!         self.0.push(name);
//!     }
//! }
//!
//! let mut names = Names(Vec::new());
//! Point { x: 1, y: 2 }.for_each_field(&mut names);
//! assert_eq!(names.0, Point::FIELD_NAMES);
//! assert_eq!(Point::member_index("y"), Some(1));
//! assert_eq!(Point { x: 1, y: 2 }.as_tuple(), (&1, &2));
//! ```

/// Receives the fields of a [`Reflect`] value by shared reference.
pub trait FieldVisitor {
    /// Called once per field, in declaration order.
    fn visit<F: 'static>(&mut self, name: &'static str, value: &F);
}

/// Receives the fields of a [`Reflect`] value by mutable reference.
pub trait FieldVisitorMut {
    /// Called once per field, in declaration order.
    fn visit<F: 'static>(&mut self, name: &'static str, value: &mut F);
}

/// A struct whose fields can be enumerated.
pub trait Reflect {
    /// Field names in declaration order.
    const FIELD_NAMES: &'static [&'static str];

    /// A tuple of references to every field.
    type Refs<'a>
    where
        Self: 'a;

    /// Number of reflected fields.
    fn field_count() -> usize {
        Self::FIELD_NAMES.len()
    }

    /// Declaration index of the field called `name`.
    fn member_index(name: &str) -> Option<usize> {
        Self::FIELD_NAMES.iter().position(|field| *field == name)
    }

    /// References to every field, as a tuple.
    fn as_tuple(&self) -> Self::Refs<'_>;

    /// Hands every field to `visitor`.
    fn for_each_field<V: FieldVisitor>(&self, visitor: &mut V);

    /// Hands every field to `visitor` mutably.
    fn for_each_field_mut<V: FieldVisitorMut>(&mut self, visitor: &mut V);
}
