//! Element types and the runtime-typed sample buffer.
//!
//! An image carries exactly one scalar element type. The buffer is stored as
//! an enum over owned `Vec`s so that a single image record can hold any of the
//! supported types, while the engine works on typed slices obtained through
//! [`Element`].

use std::fmt;

use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Scalar element type of an image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
}

impl DataType {
    /// NIfTI datatype code.
    pub fn code(self) -> i16 {
        match self {
            DataType::UInt8 => 2,
            DataType::Int16 => 4,
            DataType::Int32 => 8,
            DataType::Float32 => 16,
            DataType::Float64 => 64,
            DataType::Int8 => 256,
            DataType::UInt16 => 512,
            DataType::UInt32 => 768,
            DataType::Int64 => 1024,
            DataType::UInt64 => 1280,
        }
    }

    /// Look up a datatype from its NIfTI code.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            2 => Some(DataType::UInt8),
            4 => Some(DataType::Int16),
            8 => Some(DataType::Int32),
            16 => Some(DataType::Float32),
            64 => Some(DataType::Float64),
            256 => Some(DataType::Int8),
            512 => Some(DataType::UInt16),
            768 => Some(DataType::UInt32),
            1024 => Some(DataType::Int64),
            1280 => Some(DataType::UInt64),
            _ => None,
        }
    }

    /// Bytes per element.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::UInt8 | DataType::Int8 => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::UInt64 | DataType::Int64 | DataType::Float64 => 8,
        }
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Short Rust-style name of the element type.
    pub fn name(self) -> &'static str {
        match self {
            DataType::UInt8 => "u8",
            DataType::Int8 => "i8",
            DataType::UInt16 => "u16",
            DataType::Int16 => "i16",
            DataType::UInt32 => "u32",
            DataType::Int32 => "i32",
            DataType::UInt64 => "u64",
            DataType::Int64 => "i64",
            DataType::Float32 => "f32",
            DataType::Float64 => "f64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owned sample buffer, one variant per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    UInt8(Vec<u8>),
    Int8(Vec<i8>),
    UInt16(Vec<u16>),
    Int16(Vec<i16>),
    UInt32(Vec<u32>),
    Int32(Vec<i32>),
    UInt64(Vec<u64>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// A primitive sample type that can live inside an [`ImageData`] buffer.
pub trait Element: Copy + Default + PartialEq + Send + Sync + fmt::Debug + 'static {
    const DATATYPE: DataType;

    /// Move a typed vector into the runtime-typed buffer.
    fn wrap(values: Vec<Self>) -> ImageData;

    /// Borrow the buffer as `&[Self]`, or `None` when the types differ.
    fn slice(data: &ImageData) -> Option<&[Self]>;

    /// Borrow the buffer as `&mut [Self]`, or `None` when the types differ.
    fn slice_mut(data: &mut ImageData) -> Option<&mut [Self]>;
}

/// Floating-point element types the deformation engine computes in.
pub trait Real: Element + Float {
    /// Narrow (or pass through) an `f64` value.
    fn cast(value: f64) -> Self;

    /// Widen to `f64`.
    fn widen(self) -> f64;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DATATYPE: DataType = DataType::$variant;

                fn wrap(values: Vec<Self>) -> ImageData {
                    ImageData::$variant(values)
                }

                fn slice(data: &ImageData) -> Option<&[Self]> {
                    match data {
                        ImageData::$variant(values) => Some(values.as_slice()),
                        _ => None,
                    }
                }

                fn slice_mut(data: &mut ImageData) -> Option<&mut [Self]> {
                    match data {
                        ImageData::$variant(values) => Some(values.as_mut_slice()),
                        _ => None,
                    }
                }
            }
        )*

        impl ImageData {
            /// Allocate a zero-filled buffer of `len` elements.
            pub fn zeros(datatype: DataType, len: usize) -> Self {
                match datatype {
                    $(DataType::$variant => ImageData::$variant(vec![<$ty>::default(); len]),)*
                }
            }

            /// Element type of the buffer.
            pub fn datatype(&self) -> DataType {
                match self {
                    $(ImageData::$variant(_) => DataType::$variant,)*
                }
            }

            /// Number of elements.
            pub fn len(&self) -> usize {
                match self {
                    $(ImageData::$variant(values) => values.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }
    };
}

impl_element! {
    u8 => UInt8,
    i8 => Int8,
    u16 => UInt16,
    i16 => Int16,
    u32 => UInt32,
    i32 => Int32,
    u64 => UInt64,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
}

impl Real for f32 {
    #[inline(always)]
    fn cast(value: f64) -> Self {
        value as f32
    }

    #[inline(always)]
    fn widen(self) -> f64 {
        self as f64
    }
}

impl Real for f64 {
    #[inline(always)]
    fn cast(value: f64) -> Self {
        value
    }

    #[inline(always)]
    fn widen(self) -> f64 {
        self
    }
}
