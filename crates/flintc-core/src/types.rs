//! The `Type` model (spec.md §3.3): primitive, composite (data, entity,
//! error set, variant, optional) and multi-type (fixed-width vector)
//! descriptors, each with a stable string form and equality rule.

use serde::{Deserialize, Serialize};

use crate::id::DefId;

/// A primitive scalar type (spec.md §3.3 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Str,
    Void,
}

impl PrimitiveType {
    pub const ALL: &'static [PrimitiveType] = &[
        PrimitiveType::I8,
        PrimitiveType::I16,
        PrimitiveType::I32,
        PrimitiveType::I64,
        PrimitiveType::U8,
        PrimitiveType::U16,
        PrimitiveType::U32,
        PrimitiveType::U64,
        PrimitiveType::F32,
        PrimitiveType::F64,
        PrimitiveType::Bool,
        PrimitiveType::Str,
        PrimitiveType::Void,
    ];

    /// The spelling used in the source language and as the canonical name.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::I8 => "i8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Str => "str",
            PrimitiveType::Void => "void",
        }
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(self, PrimitiveType::I8 | PrimitiveType::I16 | PrimitiveType::I32 | PrimitiveType::I64)
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(self, PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 | PrimitiveType::U64)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveType::F32 | PrimitiveType::F64)
    }

    /// Bit width of an integer/float primitive; `None` for `bool`/`str`/`void`.
    pub fn bit_width(self) -> Option<u32> {
        match self {
            PrimitiveType::I8 | PrimitiveType::U8 => Some(8),
            PrimitiveType::I16 | PrimitiveType::U16 => Some(16),
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => Some(32),
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => Some(64),
            PrimitiveType::Bool | PrimitiveType::Str | PrimitiveType::Void => None,
        }
    }
}

/// Width of a `MultiType` (fixed-width vector-of-element), spec.md §3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiWidth {
    W2 = 2,
    W3 = 3,
    W4 = 4,
    W8 = 8,
}

impl MultiWidth {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            2 => Some(MultiWidth::W2),
            3 => Some(MultiWidth::W3),
            4 => Some(MultiWidth::W4),
            8 => Some(MultiWidth::W8),
            _ => None,
        }
    }
}

/// A tagged type descriptor (spec.md §3.3). Equality follows the rule in
/// the spec's table: primitives by name, multi-types by element+width, data
/// and entity by arena identity (`DefId`), error sets by their stable id,
/// variants by identity, optionals by their inner type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Primitive(PrimitiveType),
    MultiType {
        element: Box<Type>,
        width: MultiWidth,
    },
    /// References a `DataNode` definition by arena identity.
    Data(DefId),
    /// References an `EntityNode` definition by arena identity.
    Entity(DefId),
    ErrorSet {
        name: String,
        parent: Option<String>,
        values: Vec<String>,
        id: u32,
    },
    /// A variant (tagged union): tag name plus the ordered tag -> payload map.
    /// Carries an identity token (its defining `DefId`) since spec.md mandates
    /// identity equality for variants, not structural equality of the payload map.
    Variant {
        tag_name: String,
        payloads: Vec<(String, Type)>,
        identity: DefId,
    },
    Optional(Box<Type>),
}

impl Type {
    /// The stable string form used as a map key for lowered representations
    /// (spec.md §3.3) and as the input to the `TypeId` hash.
    pub fn canonical_name(&self) -> String {
        match self {
            Type::Primitive(p) => p.name().to_string(),
            Type::MultiType { element, width } => {
                format!("[{}x{}]", element.canonical_name(), width.as_u8())
            }
            Type::Data(id) => format!("data#{}", id.0),
            Type::Entity(id) => format!("entity#{}", id.0),
            Type::ErrorSet { name, .. } => format!("error#{}", name),
            Type::Variant { identity, .. } => format!("variant#{}", identity.0),
            Type::Optional(inner) => format!("{}?", inner.canonical_name()),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveType::Void))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveType::Str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_canonical_name() {
        assert_eq!(Type::Primitive(PrimitiveType::I32).canonical_name(), "i32");
    }

    #[test]
    fn multitype_canonical_name_includes_width() {
        let ty = Type::MultiType {
            element: Box::new(Type::Primitive(PrimitiveType::F64)),
            width: MultiWidth::W4,
        };
        assert_eq!(ty.canonical_name(), "[f64x4]");
    }

    #[test]
    fn optional_wraps_inner_name() {
        let ty = Type::Optional(Box::new(Type::Primitive(PrimitiveType::Bool)));
        assert_eq!(ty.canonical_name(), "bool?");
    }

    #[test]
    fn data_and_entity_equality_is_by_identity() {
        let a = Type::Data(DefId(1));
        let b = Type::Data(DefId(1));
        let c = Type::Data(DefId(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
