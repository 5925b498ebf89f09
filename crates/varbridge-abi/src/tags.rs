//! The closed set of variant type tags and their static metadata.
//!
//! Every value crossing the boundary is identified by a [`VariantTag`].
//! Each tag maps to exactly one fixed storage size and one canonical
//! in-memory representation; that mapping is a compile-time table and
//! never changes at runtime.

use num_enum::TryFromPrimitive;
use thiserror::Error;

/// Number of valid tags. The foreign side delimits the set with a MAX
/// sentinel equal to this value; it is never a valid tag itself.
pub const TAG_COUNT: usize = 39;

/// Raw tag value outside the closed set.
///
/// This is fatal: a tag the table does not know about means a corrupted
/// value or a version-mismatched foreign binary, never a user mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid variant tag value {0}")]
pub struct InvalidTag(pub i32);

/// Runtime discriminator identifying which variant type a value is.
///
/// `Nil` doubles as the generic "any" tag: a top-level variant box is
/// addressed with tag `Nil`, and a `Nil`-typed value is the none value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(i32)]
pub enum VariantTag {
    Nil = 0,
    Bool,
    Int,
    Float,
    String,
    Vector2,
    Vector2i,
    Rect2,
    Rect2i,
    Vector3,
    Vector3i,
    Transform2D,
    Vector4,
    Vector4i,
    Plane,
    Quaternion,
    Aabb,
    Basis,
    Transform3D,
    Projection,
    Color,
    StringName,
    NodePath,
    Rid,
    Object,
    Callable,
    Signal,
    Dictionary,
    Array,
    PackedByteArray,
    PackedInt32Array,
    PackedInt64Array,
    PackedFloat32Array,
    PackedFloat64Array,
    PackedStringArray,
    PackedVector2Array,
    PackedVector3Array,
    PackedColorArray,
    PackedVector4Array,
}

/// Broad marshaling category of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// The nil/any tag.
    Nil,
    /// Native host scalar (bool, int, float).
    Scalar,
    /// Text value (string, interned string, path).
    StringLike,
    /// Foreign object reference.
    Object,
    /// Callable value.
    Callable,
    /// Keyed dynamic container.
    Dictionary,
    /// Indexed container with a declared element tag.
    ArrayLike,
    /// Opaque aggregate copied by the ABI's copy constructor.
    Aggregate,
}

/// Static metadata for one tag.
#[derive(Debug, Clone, Copy)]
pub struct TagInfo {
    pub tag: VariantTag,
    pub name: &'static str,
    /// Fixed storage size in bytes of the canonical representation.
    pub size: usize,
    /// Plain bytes: no ABI destructor needs to run before overwrite.
    pub trivial: bool,
    pub kind: TagKind,
    /// Declared element tag for array-like tags.
    pub element: Option<VariantTag>,
}

macro_rules! tag_table {
    ($($tag:ident, $size:expr, $trivial:expr, $kind:ident, $element:expr;)*) => {
        const TAG_INFOS: [TagInfo; TAG_COUNT] = [
            $(TagInfo {
                tag: VariantTag::$tag,
                name: stringify!($tag),
                size: $size,
                trivial: $trivial,
                kind: TagKind::$kind,
                element: $element,
            },)*
        ];
    };
}

tag_table! {
    Nil,                24, false, Nil,        None;
    Bool,               1,  true,  Scalar,     None;
    Int,                8,  true,  Scalar,     None;
    Float,              8,  true,  Scalar,     None;
    String,             8,  false, StringLike, None;
    Vector2,            8,  true,  Aggregate,  None;
    Vector2i,           8,  true,  Aggregate,  None;
    Rect2,              16, true,  Aggregate,  None;
    Rect2i,             16, true,  Aggregate,  None;
    Vector3,            12, true,  Aggregate,  None;
    Vector3i,           12, true,  Aggregate,  None;
    Transform2D,        24, true,  Aggregate,  None;
    Vector4,            16, true,  Aggregate,  None;
    Vector4i,           16, true,  Aggregate,  None;
    Plane,              16, true,  Aggregate,  None;
    Quaternion,         16, true,  Aggregate,  None;
    Aabb,               24, true,  Aggregate,  None;
    Basis,              36, true,  Aggregate,  None;
    Transform3D,        48, true,  Aggregate,  None;
    Projection,         64, true,  Aggregate,  None;
    Color,              16, true,  Aggregate,  None;
    StringName,         8,  false, StringLike, None;
    NodePath,           8,  false, StringLike, None;
    Rid,                8,  true,  Aggregate,  None;
    Object,             8,  true,  Object,     None;
    Callable,           8,  false, Callable,   None;
    Signal,             8,  false, Aggregate,  None;
    Dictionary,         8,  false, Dictionary, None;
    Array,              8,  false, ArrayLike,  Some(VariantTag::Nil);
    PackedByteArray,    8,  false, ArrayLike,  Some(VariantTag::Int);
    PackedInt32Array,   8,  false, ArrayLike,  Some(VariantTag::Int);
    PackedInt64Array,   8,  false, ArrayLike,  Some(VariantTag::Int);
    PackedFloat32Array, 8,  false, ArrayLike,  Some(VariantTag::Float);
    PackedFloat64Array, 8,  false, ArrayLike,  Some(VariantTag::Float);
    PackedStringArray,  8,  false, ArrayLike,  Some(VariantTag::String);
    PackedVector2Array, 8,  false, ArrayLike,  Some(VariantTag::Vector2);
    PackedVector3Array, 8,  false, ArrayLike,  Some(VariantTag::Vector3);
    PackedColorArray,   8,  false, ArrayLike,  Some(VariantTag::Color);
    PackedVector4Array, 8,  false, ArrayLike,  Some(VariantTag::Vector4);
}

/// Largest per-tag storage size; temporary slots are sized to this.
pub const MAX_VALUE_SIZE: usize = 64;

impl VariantTag {
    /// The single raw-to-tag translation point. Fails for anything at or
    /// past the MAX sentinel, including the sentinel itself.
    pub fn from_raw(raw: i32) -> Result<Self, InvalidTag> {
        Self::try_from(raw).map_err(|_| InvalidTag(raw))
    }

    pub fn to_raw(self) -> i32 {
        self as i32
    }

    /// Static metadata for this tag.
    pub fn info(self) -> &'static TagInfo {
        &TAG_INFOS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn kind(self) -> TagKind {
        self.info().kind
    }

    pub fn is_trivial(self) -> bool {
        self.info().trivial
    }

    /// Declared element tag for array-like tags.
    pub fn element_tag(self) -> Option<VariantTag> {
        self.info().element
    }

    pub fn is_array_like(self) -> bool {
        self.kind() == TagKind::ArrayLike
    }
}
