use crate::value::AttributeValue;
use std::{fmt, marker::PhantomData};

///
/// Field
///
/// Typed handle onto one declared attribute. Models publish these as
/// constants so callers read and write attributes through a static table
/// instead of looking names up ad hoc.
///

pub struct Field<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: AttributeValue> Field<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.name).finish()
    }
}
