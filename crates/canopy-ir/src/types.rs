//! Attributes, interned types and interned source paths.

use std::collections::BTreeMap;
use std::fmt;

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::refs::{PathRef, TypeRef};
use crate::symbol::Symbol;

// ============================================================================
// Attribute
// ============================================================================

/// Constant data attached to operations and types.
///
/// Attributes are plain values: they compare and hash structurally and never
/// take part in use-def tracking.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    Unit,
    Bool(bool),
    /// Signless integer stored as raw bits.
    IntBits(u64),
    /// IEEE float stored as raw bits.
    FloatBits(u64),
    String(String),
    Bytes(SmallVec<[u8; 16]>),
    /// Dense array of signless integers.
    DenseInts(Vec<u64>),
    Type(TypeRef),
    /// Reference to a named entity, printed as `@name`.
    Symbol(Symbol),
    List(Vec<Attribute>),
}

impl Attribute {
    /// Short kind name used in verification messages.
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Unit => AttributeKind::Unit,
            Attribute::Bool(_) => AttributeKind::Bool,
            Attribute::IntBits(_) => AttributeKind::Int,
            Attribute::FloatBits(_) => AttributeKind::Float,
            Attribute::String(_) => AttributeKind::String,
            Attribute::Bytes(_) => AttributeKind::Bytes,
            Attribute::DenseInts(_) => AttributeKind::DenseInts,
            Attribute::Type(_) => AttributeKind::Type,
            Attribute::Symbol(_) => AttributeKind::Symbol,
            Attribute::List(_) => AttributeKind::List,
        }
    }

    /// Interpret integer bits as a signed value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Attribute::IntBits(bits) => Some(*bits as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Attribute::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Attribute::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attribute::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeRef> {
        match self {
            Attribute::Type(ty) => Some(*ty),
            _ => None,
        }
    }
}

/// Discriminant of [`Attribute`], used by attribute schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum AttributeKind {
    #[display("unit")]
    Unit,
    #[display("bool")]
    Bool,
    #[display("int")]
    Int,
    #[display("float")]
    Float,
    #[display("string")]
    String,
    #[display("bytes")]
    Bytes,
    #[display("dense")]
    DenseInts,
    #[display("type")]
    Type,
    #[display("symbol")]
    Symbol,
    #[display("list")]
    List,
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Attribute::IntBits(value as u64)
    }
}

impl From<u64> for Attribute {
    fn from(value: u64) -> Self {
        Attribute::IntBits(value)
    }
}

impl From<f64> for Attribute {
    fn from(value: f64) -> Self {
        Attribute::FloatBits(value.to_bits())
    }
}

impl From<bool> for Attribute {
    fn from(value: bool) -> Self {
        Attribute::Bool(value)
    }
}

impl From<Vec<Attribute>> for Attribute {
    fn from(value: Vec<Attribute>) -> Self {
        Attribute::List(value)
    }
}

impl From<Symbol> for Attribute {
    fn from(value: Symbol) -> Self {
        Attribute::Symbol(value)
    }
}

impl From<TypeRef> for Attribute {
    fn from(value: TypeRef) -> Self {
        Attribute::Type(value)
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Attribute::String(value)
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::String(value.to_string())
    }
}

// ============================================================================
// TypeData
// ============================================================================

/// Structural description of a type, deduplicated by [`TypeInterner`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeData {
    pub dialect: Symbol,
    pub name: Symbol,
    pub params: SmallVec<[TypeRef; 4]>,
    pub attrs: BTreeMap<Symbol, Attribute>,
}

impl TypeData {
    /// A parameterless type such as `core.i32`.
    pub fn simple(dialect: Symbol, name: Symbol) -> Self {
        TypeDataBuilder::new(dialect, name).build()
    }
}

pub struct TypeDataBuilder {
    dialect: Symbol,
    name: Symbol,
    params: SmallVec<[TypeRef; 4]>,
    attrs: BTreeMap<Symbol, Attribute>,
}

impl TypeDataBuilder {
    pub fn new(dialect: Symbol, name: Symbol) -> Self {
        Self {
            dialect,
            name,
            params: SmallVec::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    pub fn params(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.params.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attrs.insert(key.into(), val);
        self
    }

    pub fn build(self) -> TypeData {
        TypeData {
            dialect: self.dialect,
            name: self.name,
            params: self.params,
            attrs: self.attrs,
        }
    }
}

// ============================================================================
// Interners
// ============================================================================

/// Deduplicating type interner. Equal `TypeData` always yields the same `TypeRef`.
#[derive(Default)]
pub struct TypeInterner {
    types: PrimaryMap<TypeRef, TypeData>,
    dedup: FxHashMap<TypeData, TypeRef>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, data: TypeData) -> TypeRef {
        if let Some(&existing) = self.dedup.get(&data) {
            return existing;
        }
        let r = self.types.push(data.clone());
        self.dedup.insert(data, r);
        r
    }

    pub fn get(&self, r: TypeRef) -> &TypeData {
        &self.types[r]
    }

    pub fn is_dialect(&self, r: TypeRef, dialect: Symbol, name: Symbol) -> bool {
        let data = &self.types[r];
        data.dialect == dialect && data.name == name
    }

    /// Render a type as `dialect.name(params...)`.
    pub fn display(&self, r: TypeRef) -> TypeDisplay<'_> {
        TypeDisplay { types: self, ty: r }
    }
}

pub struct TypeDisplay<'a> {
    types: &'a TypeInterner,
    ty: TypeRef,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.types.get(self.ty);
        write!(f, "{}.{}", data.dialect, data.name)?;
        if !data.params.is_empty() {
            f.write_str("(")?;
            for (i, &p) in data.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", self.types.display(p))?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Deduplicating interner for source path strings.
#[derive(Default)]
pub struct PathInterner {
    paths: PrimaryMap<PathRef, String>,
    dedup: FxHashMap<String, PathRef>,
}

impl PathInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, path: impl Into<String>) -> PathRef {
        let path = path.into();
        if let Some(&existing) = self.dedup.get(&path) {
            return existing;
        }
        let r = self.paths.push(path.clone());
        self.dedup.insert(path, r);
        r
    }

    pub fn get(&self, r: PathRef) -> &str {
        &self.paths[r]
    }
}
