//! `define_port_error!`: error enums for driven and driving ports.
//!
//! Each variant is listed as `Name { field: Type, .. } => "display text"`.
//! The macro derives `thiserror::Error` from the display text and adds one
//! snake_case constructor per variant whose parameters take `impl Into<T>`,
//! so adapters can write `ContactRepositoryError::query(err.to_string())`
//! or pass a `&str` directly.

macro_rules! define_port_error {
    (@constructor $variant:ident) => {
        ::paste::paste! {
            #[must_use]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@constructor $variant:ident { $($field:ident : $ty:ty),+ }) => {
        ::paste::paste! {
            #[must_use]
            pub fn [<$variant:snake>]($($field: impl Into<$ty>),+) -> Self {
                Self::$variant {
                    $($field: $field.into()),+
                }
            }
        }
    };

    (
        $(#[$enum_attr:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_attr:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),+ $(,)? } )? => $display:expr
            ),* $(,)?
        }
    ) => {
        $(#[$enum_attr])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_attr])*
                #[error($display)]
                $variant $( { $($field: $ty),+ } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@constructor $variant $( { $($field : $ty),+ } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;
