//! Declaration index over parsed source files: the "type loader" the rest of
//! the pipeline consults.
//!
//! The universe indexes struct, enum and impl declarations by name at
//! construction time, then resolves them into [`Model`] values lazily,
//! caching per canonical name for the lifetime of the universe. Member
//! enumeration always follows declaration order, so repeated resolutions are
//! byte-for-byte reproducible.

use log::{debug, warn};
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::model::{
    ClassKind, ClassModel, FieldModel, Marker, MarkerScope, MethodModel, ParameterModel,
    SignatureModel,
};
use crate::parser::ParsedFile;

/// The attribute name that links a subclass to its named supertype:
/// `#[extends(Base)]`.
pub const EXTENDS_ATTR: &str = "extends";

/// Coordinates of an item inside the parsed file set.
#[derive(Debug, Clone, Copy)]
struct ItemCoord {
    file: usize,
    item: usize,
}

/// Index over all scanned declarations.
pub struct SourceUniverse {
    files: Vec<ParsedFile>,
    /// Class-like declarations (structs and enums) in declaration order.
    class_order: Vec<String>,
    classes: HashMap<String, ItemCoord>,
    /// Impl blocks per self-type name, in declaration order.
    impls: HashMap<String, Vec<ItemCoord>>,
    /// Names declared as constructs the model cannot represent.
    unsupported: HashSet<String>,
    cache: HashMap<String, ClassModel>,
}

impl SourceUniverse {
    /// Builds the index from parsed files. Duplicate declarations keep the
    /// first occurrence, matching walk order.
    pub fn from_files(files: Vec<ParsedFile>) -> Self {
        let mut class_order = Vec::new();
        let mut classes: HashMap<String, ItemCoord> = HashMap::new();
        let mut impls: HashMap<String, Vec<ItemCoord>> = HashMap::new();
        let mut unsupported = HashSet::new();

        for (file_idx, file) in files.iter().enumerate() {
            for (item_idx, item) in file.syntax_tree.items.iter().enumerate() {
                let coord = ItemCoord { file: file_idx, item: item_idx };
                match item {
                    syn::Item::Struct(s) => {
                        let name = s.ident.to_string();
                        if classes.contains_key(&name) {
                            warn!("duplicate declaration of `{}`, keeping the first", name);
                        } else {
                            class_order.push(name.clone());
                            classes.insert(name, coord);
                        }
                    }
                    syn::Item::Enum(e) => {
                        let name = e.ident.to_string();
                        if classes.contains_key(&name) {
                            warn!("duplicate declaration of `{}`, keeping the first", name);
                        } else {
                            class_order.push(name.clone());
                            classes.insert(name, coord);
                        }
                    }
                    syn::Item::Impl(imp) if imp.trait_.is_none() => {
                        if let Some(name) = impl_self_name(imp) {
                            impls.entry(name).or_default().push(coord);
                        }
                    }
                    syn::Item::Union(u) => {
                        unsupported.insert(u.ident.to_string());
                    }
                    syn::Item::Trait(t) => {
                        unsupported.insert(t.ident.to_string());
                    }
                    _ => {}
                }
            }
        }

        debug!(
            "Universe indexed: {} classes, {} impl targets",
            class_order.len(),
            impls.len()
        );

        Self {
            files,
            class_order,
            classes,
            impls,
            unsupported,
            cache: HashMap::new(),
        }
    }

    /// Names of structs carrying the given marker attribute, in declaration
    /// order across the scanned files.
    pub fn endpoint_names(&self, marker: &str) -> Vec<String> {
        self.class_order
            .iter()
            .filter(|name| {
                let coord = self.classes[name.as_str()];
                match &self.files[coord.file].syntax_tree.items[coord.item] {
                    syn::Item::Struct(s) => has_attr(&s.attrs, marker),
                    _ => false,
                }
            })
            .cloned()
            .collect()
    }

    /// Resolves a declaration into a class model.
    ///
    /// Returns `Ok(None)` when the name is not declared anywhere in the
    /// universe; the caller decides whether that is fatal. Resolution results
    /// are cached, so the same name always yields an identical model.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedOrigin` for declarations outside the supported
    /// variant set (unions, traits).
    pub fn resolve_class(&mut self, name: &str) -> Result<Option<ClassModel>> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(Some(cached.clone()));
        }
        if self.unsupported.contains(name) {
            return Err(Error::UnsupportedOrigin(format!(
                "`{}` is not a struct or enum",
                name
            )));
        }
        let coord = match self.classes.get(name) {
            Some(coord) => *coord,
            None => return Ok(None),
        };

        let package_markers = self.package_markers(coord.file);
        let model = match &self.files[coord.file].syntax_tree.items[coord.item] {
            syn::Item::Struct(s) => self.resolve_struct(s, package_markers),
            syn::Item::Enum(e) => resolve_enum(e, package_markers),
            _ => unreachable!("class index only holds structs and enums"),
        };

        debug!("Resolved class model for `{}`", name);
        self.cache.insert(name.to_string(), model.clone());
        Ok(Some(model))
    }

    /// File-level inner attributes, recorded as package-scope markers.
    fn package_markers(&self, file_idx: usize) -> Vec<Marker> {
        self.files[file_idx]
            .syntax_tree
            .attrs
            .iter()
            .filter_map(|a| attr_name(a))
            .map(|name| Marker::new(name, MarkerScope::Package))
            .collect()
    }

    fn resolve_struct(&self, s: &syn::ItemStruct, package_markers: Vec<Marker>) -> ClassModel {
        let name = s.ident.to_string();
        let type_params = declared_type_params(&s.generics);

        let mut markers: Vec<Marker> = s
            .attrs
            .iter()
            .filter_map(|a| attr_name(a))
            .filter(|n| n != EXTENDS_ATTR)
            .map(|n| Marker::new(n, MarkerScope::Class))
            .collect();
        markers.extend(package_markers);

        let supertype = s
            .attrs
            .iter()
            .find(|a| attr_name(a).as_deref() == Some(EXTENDS_ATTR))
            .and_then(|a| a.parse_args::<syn::Ident>().ok())
            .map(|ident| ident.to_string());

        let fields = match &s.fields {
            syn::Fields::Named(named) => named
                .named
                .iter()
                .filter_map(|f| resolve_field(f, &name, &type_params))
                .collect(),
            _ => Vec::new(),
        };

        let methods = self.resolve_methods(&name, &type_params);

        ClassModel {
            name,
            kind: ClassKind::Object,
            markers,
            supertype,
            type_params,
            fields,
            methods,
        }
    }

    /// Public fns from every inherent impl block of the named type, in
    /// declaration order.
    fn resolve_methods(&self, class_name: &str, type_params: &[String]) -> Vec<MethodModel> {
        let mut methods = Vec::new();
        let Some(coords) = self.impls.get(class_name) else {
            return methods;
        };
        for coord in coords {
            let syn::Item::Impl(imp) = &self.files[coord.file].syntax_tree.items[coord.item]
            else {
                continue;
            };
            for item in &imp.items {
                let syn::ImplItem::Fn(func) = item else { continue };
                if !matches!(func.vis, syn::Visibility::Public(_)) {
                    continue;
                }
                methods.push(resolve_method(func, class_name, type_params));
            }
        }
        methods
    }
}

fn resolve_enum(e: &syn::ItemEnum, package_markers: Vec<Marker>) -> ClassModel {
    let name = e.ident.to_string();
    let mut markers: Vec<Marker> = e
        .attrs
        .iter()
        .filter_map(|a| attr_name(a))
        .map(|n| Marker::new(n, MarkerScope::Class))
        .collect();
    markers.extend(package_markers);

    let variants = e.variants.iter().map(|v| v.ident.to_string()).collect();

    ClassModel {
        name,
        kind: ClassKind::Enumeration { variants },
        markers,
        supertype: None,
        type_params: declared_type_params(&e.generics),
        fields: Vec::new(),
        methods: Vec::new(),
    }
}

fn resolve_field(f: &syn::Field, class_name: &str, type_params: &[String]) -> Option<FieldModel> {
    let name = f.ident.as_ref()?.to_string();
    let markers = f
        .attrs
        .iter()
        .filter_map(|a| attr_name(a))
        .map(|n| Marker::new(n, MarkerScope::Member))
        .collect();
    Some(FieldModel {
        name,
        enclosing: class_name.to_string(),
        markers,
        signature: signature_from_type(&f.ty, type_params),
    })
}

fn resolve_method(func: &syn::ImplItemFn, class_name: &str, type_params: &[String]) -> MethodModel {
    let name = func.sig.ident.to_string();
    let enclosing_method = format!("{}.{}", class_name, name);

    let markers = func
        .attrs
        .iter()
        .filter_map(|a| attr_name(a))
        .map(|n| Marker::new(n, MarkerScope::Member))
        .collect();

    let mut method_params = type_params.to_vec();
    method_params.extend(declared_type_params(&func.sig.generics));

    let parameters = func
        .sig
        .inputs
        .iter()
        .filter_map(|arg| {
            let syn::FnArg::Typed(typed) = arg else { return None };
            let param_name = match typed.pat.as_ref() {
                syn::Pat::Ident(p) => p.ident.to_string(),
                _ => return None,
            };
            // Attached to the parameter itself, so nearer than the
            // enclosing method's member-scope markers.
            let markers = typed
                .attrs
                .iter()
                .filter_map(|a| attr_name(a))
                .map(|n| Marker::new(n, MarkerScope::Occurrence))
                .collect();
            Some(ParameterModel {
                name: param_name,
                enclosing: enclosing_method.clone(),
                markers,
                signature: signature_from_type(&typed.ty, &method_params),
            })
        })
        .collect();

    let return_signature = match &func.sig.output {
        syn::ReturnType::Default => None,
        syn::ReturnType::Type(_, ty) => {
            let sig = signature_from_type(ty, &method_params);
            match sig {
                SignatureModel::Named { ref name, ref args }
                    if name == "unit" && args.is_empty() =>
                {
                    None
                }
                other => Some(other),
            }
        }
    };

    MethodModel {
        name,
        enclosing: class_name.to_string(),
        markers,
        parameters,
        return_signature,
    }
}

/// Converts a syntactic type into the canonical signature model.
///
/// Structural wrappers (`Option`, sequences, maps) become dedicated variants;
/// smart pointers and `Result` are transparent; trait objects and impl-trait
/// become wildcards with the trait as bound. Shapes the document cannot
/// express (tuples, fn pointers) fall back to an unbounded wildcard rather
/// than failing the run.
pub fn signature_from_type(ty: &syn::Type, type_params: &[String]) -> SignatureModel {
    match ty {
        syn::Type::Path(type_path) => signature_from_path(&type_path.path, type_params),
        syn::Type::Reference(r) => signature_from_type(&r.elem, type_params),
        syn::Type::Slice(s) => {
            SignatureModel::Array(Box::new(signature_from_type(&s.elem, type_params)))
        }
        syn::Type::Array(a) => {
            SignatureModel::Array(Box::new(signature_from_type(&a.elem, type_params)))
        }
        syn::Type::Paren(p) => signature_from_type(&p.elem, type_params),
        syn::Type::Group(g) => signature_from_type(&g.elem, type_params),
        syn::Type::Tuple(t) if t.elems.is_empty() => SignatureModel::named("unit"),
        syn::Type::TraitObject(obj) => SignatureModel::Wildcard {
            bound: trait_bound_name(&obj.bounds, type_params),
        },
        syn::Type::ImplTrait(imp) => SignatureModel::Wildcard {
            bound: trait_bound_name(&imp.bounds, type_params),
        },
        _ => SignatureModel::Wildcard { bound: None },
    }
}

fn signature_from_path(path: &syn::Path, type_params: &[String]) -> SignatureModel {
    let Some(segment) = path.segments.last() else {
        return SignatureModel::Wildcard { bound: None };
    };
    let name = segment.ident.to_string();
    let args = generic_type_args(segment, type_params);

    match name.as_str() {
        "Option" if args.len() == 1 => {
            SignatureModel::Optional(Box::new(args.into_iter().next().unwrap()))
        }
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "LinkedList" if args.len() == 1 => {
            SignatureModel::Array(Box::new(args.into_iter().next().unwrap()))
        }
        "HashMap" | "BTreeMap" | "IndexMap" if args.len() == 2 => {
            let mut iter = args.into_iter();
            SignatureModel::Map {
                key: Box::new(iter.next().unwrap()),
                value: Box::new(iter.next().unwrap()),
            }
        }
        // Transparent wrappers: the schema describes the payload, not the box.
        "Box" | "Rc" | "Arc" | "Cell" | "RefCell" | "Cow" | "Mutex" | "RwLock"
            if !args.is_empty() =>
        {
            args.into_iter().next().unwrap()
        }
        "Result" if !args.is_empty() => args.into_iter().next().unwrap(),
        _ => {
            if args.is_empty()
                && path.segments.len() == 1
                && type_params.iter().any(|p| p == &name)
            {
                SignatureModel::TypeVar(name)
            } else {
                SignatureModel::Named { name, args }
            }
        }
    }
}

fn generic_type_args(segment: &syn::PathSegment, type_params: &[String]) -> Vec<SignatureModel> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(signature_from_type(ty, type_params)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn trait_bound_name(
    bounds: &syn::punctuated::Punctuated<syn::TypeParamBound, syn::token::Plus>,
    type_params: &[String],
) -> Option<Box<SignatureModel>> {
    bounds.iter().find_map(|bound| match bound {
        syn::TypeParamBound::Trait(t) => {
            Some(Box::new(signature_from_path(&t.path, type_params)))
        }
        _ => None,
    })
}

fn declared_type_params(generics: &syn::Generics) -> Vec<String> {
    generics
        .params
        .iter()
        .filter_map(|p| match p {
            syn::GenericParam::Type(t) => Some(t.ident.to_string()),
            _ => None,
        })
        .collect()
}

fn impl_self_name(imp: &syn::ItemImpl) -> Option<String> {
    match imp.self_ty.as_ref() {
        syn::Type::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

fn attr_name(attr: &syn::Attribute) -> Option<String> {
    attr.path().segments.last().map(|s| s.ident.to_string())
}

fn has_attr(attrs: &[syn::Attribute], name: &str) -> bool {
    attrs.iter().any(|a| attr_name(a).as_deref() == Some(name))
}
