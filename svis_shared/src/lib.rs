#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod command;
pub mod report;
pub mod sensitivity;

pub use command::Command;
pub use report::{ChecksumMismatch, ImuSlot, ReportFrame, StrobeSlot};
pub use sensitivity::{AccelRange, GyroRange};

/// Length of every frame on the raw HID endpoint, in both directions.
pub const REPORT_LEN: usize = 64;

/// Byte offset of the little-endian u16 checksum within a report frame.
pub const CHECKSUM_OFFSET: usize = 62;

/// USB vendor id of the sensor microcontroller.
pub const USB_VENDOR_ID: u16 = 0x16C0;

/// USB product id of the sensor microcontroller.
pub const USB_PRODUCT_ID: u16 = 0x0486;

/// Derive To/From with an added "Unknown" variant catch-all for converting
/// from numerical values that do not match a valid variant in order to
/// avoid either panicking or cumbersome error handling.
///
/// Yoinked shamelessly (with some modification) from smoltcp.
#[macro_export]
macro_rules! enum_with_unknown {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident($ty:ty) {
            $(
              $( #[$variant_attr:meta] )*
              $variant:ident = $value:expr
            ),+ $(,)?
        }
    ) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
        $( #[$enum_attr] )*
        pub enum $name {
            $(
              $( #[$variant_attr] )*
              $variant
            ),*,
            /// Catch-all for values that do not match a variant
            Unknown($ty)
        }

        impl ::core::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $( $value => $name::$variant ),*,
                    other => $name::Unknown(other)
                }
            }
        }

        impl ::core::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value ),*,
                    $name::Unknown(other) => other
                }
            }
        }
    }
}
