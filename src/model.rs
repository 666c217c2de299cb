//! Canonical model of scanned types and members.
//!
//! Everything discovered in source is normalized into the closed [`Model`]
//! sum before any other part of the pipeline sees it. Equality and hashing
//! are defined by canonical identity (qualified name, enclosing scope and
//! type-argument shape), never by provenance, which is what makes
//! deduplication across multiple discovery paths correct.

use crate::error::{Error, Result};
use std::fmt;

/// Whether a marker claims a type occurrence may be absent or must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Nullable,
    NonNull,
}

/// The scope a marker was found at, from the occurrence itself outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MarkerScope {
    /// Attached directly to the type occurrence (a parameter, a field type).
    Occurrence,
    /// Attached to the enclosing member (method or field declaration).
    Member,
    /// Attached to the enclosing class.
    Class,
    /// A file-level inner attribute acting as the package default.
    Package,
}

/// A declarative metadata marker scraped from a source attribute.
///
/// Only the name and scope are recorded here; score and polarity are assigned
/// by the configured matchers in the nullability resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub name: String,
    pub scope: MarkerScope,
}

impl Marker {
    pub fn new(name: impl Into<String>, scope: MarkerScope) -> Self {
        Self { name: name.into(), scope }
    }
}

/// Canonical identity of a model: qualified name, enclosing scope and
/// type-argument shape, flattened into a single comparable key.
///
/// Stable across repeated resolutions of the same declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn new(enclosing: Option<&str>, name: &str, shape: Option<&str>) -> Self {
        let mut key = String::new();
        if let Some(scope) = enclosing {
            key.push_str(scope);
            key.push('.');
        }
        key.push_str(name);
        if let Some(shape) = shape {
            key.push('<');
            key.push_str(shape);
            key.push('>');
        }
        CanonicalKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed variant over every construct the pipeline models.
///
/// Adding a new kind of construct means extending this enum; consumers match
/// exhaustively and the compiler finds every site that needs updating.
#[derive(Debug, Clone)]
pub enum Model {
    Class(ClassModel),
    Method(MethodModel),
    Field(FieldModel),
    Parameter(ParameterModel),
    Signature(SignatureModel),
}

impl Model {
    /// Canonical identity of this model. Two models resolved independently
    /// from the same declaration always produce equal keys.
    pub fn key(&self) -> CanonicalKey {
        match self {
            Model::Class(c) => c.key(),
            Model::Method(m) => {
                CanonicalKey::new(Some(&m.enclosing), &m.name, None)
            }
            Model::Field(fld) => CanonicalKey::new(Some(&fld.enclosing), &fld.name, None),
            Model::Parameter(p) => CanonicalKey::new(Some(&p.enclosing), &p.name, None),
            Model::Signature(s) => {
                CanonicalKey::new(None, &s.serialize(), None)
            }
        }
    }

    /// Short human-readable label used in node paths and error chains.
    pub fn label(&self) -> String {
        match self {
            Model::Class(c) => c.name.clone(),
            Model::Method(m) => format!("{}.{}", m.enclosing, m.name),
            Model::Field(fld) => format!("{}.{}", fld.enclosing, fld.name),
            Model::Parameter(p) => format!("{}({})", p.enclosing, p.name),
            Model::Signature(s) => s.serialize(),
        }
    }

    /// Markers declared directly on this model.
    pub fn markers(&self) -> &[Marker] {
        match self {
            Model::Class(c) => &c.markers,
            Model::Method(m) => &m.markers,
            Model::Field(fld) => &fld.markers,
            Model::Parameter(p) => &p.markers,
            Model::Signature(_) => &[],
        }
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Model {}

impl std::hash::Hash for Model {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// The structural shape of a class-like declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassKind {
    /// A struct with named fields.
    Object,
    /// A fieldless enum; emitted as a string schema with fixed values.
    Enumeration { variants: Vec<String> },
}

/// A scanned struct or enum declaration.
#[derive(Debug, Clone)]
pub struct ClassModel {
    /// Qualified name within the type universe.
    pub name: String,
    pub kind: ClassKind,
    /// Markers visible at class scope, plus the package default if the
    /// declaring file carries one. Declaration order.
    pub markers: Vec<Marker>,
    /// Named supertype from an `extends` attribute, if any.
    pub supertype: Option<String>,
    /// Declared type parameters, in order.
    pub type_params: Vec<String>,
    /// Field declarations, in declaration order.
    pub fields: Vec<FieldModel>,
    /// Public impl-block methods, in declaration order.
    pub methods: Vec<MethodModel>,
}

impl ClassModel {
    /// An object class with no members. Used for synthetic nodes and tests.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ClassKind::Object,
            markers: Vec::new(),
            supertype: None,
            type_params: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn key(&self) -> CanonicalKey {
        let shape = if self.type_params.is_empty() {
            None
        } else {
            Some(self.type_params.join(","))
        };
        CanonicalKey::new(None, &self.name, shape.as_deref())
    }
}

/// A callable operation on an endpoint class.
#[derive(Debug, Clone)]
pub struct MethodModel {
    pub name: String,
    /// Name of the declaring class.
    pub enclosing: String,
    pub markers: Vec<Marker>,
    pub parameters: Vec<ParameterModel>,
    /// `None` for methods that return nothing.
    pub return_signature: Option<SignatureModel>,
}

/// A named field of an entity class.
#[derive(Debug, Clone)]
pub struct FieldModel {
    pub name: String,
    pub enclosing: String,
    pub markers: Vec<Marker>,
    pub signature: SignatureModel,
}

/// A single method parameter.
#[derive(Debug, Clone)]
pub struct ParameterModel {
    pub name: String,
    /// `Class.method` of the declaring operation.
    pub enclosing: String,
    pub markers: Vec<Marker>,
    pub signature: SignatureModel,
}

/// Recursively composed type signature.
///
/// Supports a textual form such that `parse(serialize(x)) == x` for any
/// nesting depth; that symmetry is relied on by canonical keys and verified
/// by tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignatureModel {
    /// A named type, possibly with generic arguments.
    Named { name: String, args: Vec<SignatureModel> },
    /// A homogeneous sequence (`Vec<T>`, slices, arrays).
    Array(Box<SignatureModel>),
    /// An optional occurrence (`Option<T>`).
    Optional(Box<SignatureModel>),
    /// A key/value mapping (`HashMap`, `BTreeMap`).
    Map { key: Box<SignatureModel>, value: Box<SignatureModel> },
    /// A type variable bound by the enclosing declaration.
    TypeVar(String),
    /// An unnamed type with an optional upper bound (`dyn Trait`, `impl Trait`).
    Wildcard { bound: Option<Box<SignatureModel>> },
}

impl SignatureModel {
    pub fn named(name: impl Into<String>) -> Self {
        SignatureModel::Named { name: name.into(), args: Vec::new() }
    }

    /// Canonical textual form. `array`, `optional` and `map` are reserved
    /// heads; type variables carry a `#` sigil so they never collide with
    /// named types when parsed back.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        match self {
            SignatureModel::Named { name, args } => {
                out.push_str(name);
                if !args.is_empty() {
                    out.push('<');
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        arg.write(out);
                    }
                    out.push('>');
                }
            }
            SignatureModel::Array(inner) => {
                out.push_str("array<");
                inner.write(out);
                out.push('>');
            }
            SignatureModel::Optional(inner) => {
                out.push_str("optional<");
                inner.write(out);
                out.push('>');
            }
            SignatureModel::Map { key, value } => {
                out.push_str("map<");
                key.write(out);
                out.push(',');
                value.write(out);
                out.push('>');
            }
            SignatureModel::TypeVar(name) => {
                out.push('#');
                out.push_str(name);
            }
            SignatureModel::Wildcard { bound } => {
                out.push('?');
                if let Some(bound) = bound {
                    out.push(':');
                    bound.write(out);
                }
            }
        }
    }

    /// Parses the canonical textual form back into a signature.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = SignatureParser::new(input);
        let sig = parser.parse_signature()?;
        parser.expect_end()?;
        Ok(sig)
    }

    /// Every named type referenced anywhere inside this signature, in
    /// left-to-right order. Used by the dependency scanner.
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            SignatureModel::Named { name, args } => {
                names.push(name.as_str());
                for arg in args {
                    arg.collect_names(names);
                }
            }
            SignatureModel::Array(inner) | SignatureModel::Optional(inner) => {
                inner.collect_names(names)
            }
            SignatureModel::Map { key, value } => {
                key.collect_names(names);
                value.collect_names(names);
            }
            SignatureModel::TypeVar(_) => {}
            // Wildcard bounds name traits; those never materialize as
            // entities, so they are not dependencies.
            SignatureModel::Wildcard { .. } => {}
        }
    }

    /// True when the outermost occurrence is `Optional`.
    pub fn is_optional(&self) -> bool {
        matches!(self, SignatureModel::Optional(_))
    }
}

impl fmt::Display for SignatureModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Recursive-descent parser over the canonical signature text.
struct SignatureParser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> SignatureParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, chars: input.char_indices().peekable() }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::SignatureSyntax {
            input: self.input.to_string(),
            message: message.into(),
        }
    }

    fn skip_spaces(&mut self) {
        while let Some((_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, expected: char) -> Result<()> {
        self.skip_spaces();
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((_, c)) => Err(self.error(format!("expected `{}`, found `{}`", expected, c))),
            None => Err(self.error(format!("expected `{}`, found end of input", expected))),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_spaces();
        self.chars.peek().map(|(_, c)| *c)
    }

    fn ident(&mut self) -> Result<String> {
        self.skip_spaces();
        let mut out = String::new();
        while let Some((_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || *c == '_' || *c == '.' {
                out.push(*c);
                self.chars.next();
            } else {
                break;
            }
        }
        if out.is_empty() {
            Err(self.error("expected an identifier"))
        } else {
            Ok(out)
        }
    }

    fn parse_signature(&mut self) -> Result<SignatureModel> {
        match self.peek() {
            Some('#') => {
                self.chars.next();
                Ok(SignatureModel::TypeVar(self.ident()?))
            }
            Some('?') => {
                self.chars.next();
                if self.peek() == Some(':') {
                    self.chars.next();
                    let bound = self.parse_signature()?;
                    Ok(SignatureModel::Wildcard { bound: Some(Box::new(bound)) })
                } else {
                    Ok(SignatureModel::Wildcard { bound: None })
                }
            }
            Some(_) => {
                let name = self.ident()?;
                let mut args = Vec::new();
                if self.peek() == Some('<') {
                    self.eat('<')?;
                    loop {
                        args.push(self.parse_signature()?);
                        match self.peek() {
                            Some(',') => {
                                self.chars.next();
                            }
                            Some('>') => break,
                            _ => return Err(self.error("expected `,` or `>`")),
                        }
                    }
                    self.eat('>')?;
                }
                self.assemble(name, args)
            }
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn assemble(&self, name: String, mut args: Vec<SignatureModel>) -> Result<SignatureModel> {
        match (name.as_str(), args.len()) {
            ("array", 1) => Ok(SignatureModel::Array(Box::new(args.remove(0)))),
            ("optional", 1) => Ok(SignatureModel::Optional(Box::new(args.remove(0)))),
            ("map", 2) => {
                let value = args.pop().map(Box::new);
                let key = args.pop().map(Box::new);
                Ok(SignatureModel::Map {
                    key: key.ok_or_else(|| self.error("map requires a key"))?,
                    value: value.ok_or_else(|| self.error("map requires a value"))?,
                })
            }
            ("array", n) | ("optional", n) if n != 1 => {
                Err(self.error(format!("`{}` takes exactly one argument", name)))
            }
            ("map", _) => Err(self.error("`map` takes exactly two arguments")),
            _ => Ok(SignatureModel::Named { name, args }),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_spaces();
        match self.chars.next() {
            None => Ok(()),
            Some((_, c)) => Err(self.error(format!("trailing input starting at `{}`", c))),
        }
    }
}

/// A Rust scalar with its OpenAPI type and format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scalar {
    pub schema_type: &'static str,
    pub format: Option<&'static str>,
}

/// Looks up the scalar mapping for a type name.
///
/// Scalars never become entity schemas; the dependency scanner skips them
/// and fragments inline their type/format.
pub fn scalar_type(name: &str) -> Option<Scalar> {
    let (schema_type, format) = match name {
        "String" | "str" | "string" | "char" => ("string", None),
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => ("integer", Some("int32")),
        "i64" | "i128" | "u64" | "u128" | "isize" | "usize" => ("integer", Some("int64")),
        "f32" => ("number", Some("float")),
        "f64" => ("number", Some("double")),
        "bool" | "boolean" => ("boolean", None),
        _ => return None,
    };
    Some(Scalar { schema_type, format })
}
