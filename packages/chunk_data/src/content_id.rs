//! Small integer ids referring to entries of the content tables.
//!
//! Id 0 of every table is the null entry.

use std::fmt::{self, Debug, Formatter};


macro_rules! content_ids {
    ($($name:ident $null:ident $prefix:literal,)*)=>{$(
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
        pub struct $name(pub u16);

        impl $name {
            pub const NULL: Self = $name(0);

            pub fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        pub const $null: $name = $name::NULL;
    )*};
}

content_ids!(
    TerId T_NULL "ter",
    FurnId F_NULL "furn",
    TrapId TR_NULL "trap",
    FieldTypeId FD_NULL "field",
);
