//! TypeRenderer: from the checker's type representation back to syntax
//!
//! Used by the state emitter to spell the type of every hoisted variable in
//! the synthesized state record. Named types from peer packages register an
//! import on the target file; the untyped constant forms collapse to their
//! default typed spelling.

use crate::{
    ast_store::IdGen,
    error::{Error, Result, inconsistent},
    snapshot::{BasicType, Type, TypeTable},
    syntax::{FieldDecl, File, Ident, InterfaceMember, Param, TypeExpr},
    types::TypeId,
};

pub struct TypeRenderer<'a> {
    types: &'a TypeTable,
    /// Import path of the package the rendered expression will live in;
    /// named types of this package render bare
    current_package: &'a str,
}

impl<'a> TypeRenderer<'a> {
    pub fn new(types: &'a TypeTable, current_package: &'a str) -> Self {
        Self {
            types,
            current_package,
        }
    }

    /// Render `ty` into a type expression valid inside `file`
    pub fn render(&self, ty: TypeId, file: &mut File, ids: &mut IdGen) -> Result<TypeExpr> {
        let resolved = self
            .types
            .get(ty)
            .ok_or_else(|| inconsistent(format!("type {ty:?} missing from table")))?
            .clone();

        match resolved {
            Type::Basic(basic) => {
                let name = basic_name(basic)?;
                Ok(TypeExpr::Name(Ident::new(ids.fresh(), name)))
            }
            Type::Array { len, elem } => Ok(TypeExpr::Array {
                len: len.to_string(),
                elem: Box::new(self.render(elem, file, ids)?),
            }),
            Type::Slice { elem } => Ok(TypeExpr::Slice(Box::new(self.render(elem, file, ids)?))),
            Type::Pointer { elem } => {
                Ok(TypeExpr::Pointer(Box::new(self.render(elem, file, ids)?)))
            }
            Type::Map { key, value } => Ok(TypeExpr::Map {
                key: Box::new(self.render(key, file, ids)?),
                value: Box::new(self.render(value, file, ids)?),
            }),
            Type::Chan { dir, elem } => Ok(TypeExpr::Chan {
                dir,
                elem: Box::new(self.render(elem, file, ids)?),
            }),
            Type::Func { params, results } => Ok(TypeExpr::Func {
                params: self.render_slots(&params, file, ids)?,
                results: self.render_slots(&results, file, ids)?,
            }),
            Type::Struct { fields } => {
                let mut rendered = Vec::with_capacity(fields.len());
                for (name, field_ty) in fields {
                    rendered.push(FieldDecl {
                        names: vec![Ident::new(ids.fresh(), name)],
                        ty: self.render(field_ty, file, ids)?,
                    });
                }
                Ok(TypeExpr::Struct { fields: rendered })
            }
            Type::Interface { embedded, methods } => {
                let mut members = Vec::new();
                for emb in embedded {
                    members.push(InterfaceMember::Embedded(self.render(emb, file, ids)?));
                }
                for (name, sig) in methods {
                    let Some(Type::Func { params, results }) = self.types.get(sig).cloned()
                    else {
                        return Err(inconsistent(format!(
                            "interface method {name} has a non-signature type"
                        )));
                    };
                    members.push(InterfaceMember::Method {
                        name: Ident::new(ids.fresh(), name),
                        params: self.render_slots(&params, file, ids)?,
                        results: self.render_slots(&results, file, ids)?,
                    });
                }
                Ok(TypeExpr::Interface { members })
            }
            Type::Named { package, name } => match package {
                // error has no owning package; same-package names render bare
                None => Ok(TypeExpr::Name(Ident::new(ids.fresh(), name))),
                Some(ref pkg) if pkg.as_str() == self.current_package => {
                    Ok(TypeExpr::Name(Ident::new(ids.fresh(), name)))
                }
                Some(pkg) => {
                    file.ensure_import(ids.fresh(), &pkg);
                    Ok(TypeExpr::Name(Ident::qualified(ids.fresh(), name, pkg)))
                }
            },
            Type::Tuple { .. } => Err(Error::UnsupportedType("tuple".to_string())),
        }
    }

    fn render_slots(
        &self,
        slots: &[(Option<String>, TypeId)],
        file: &mut File,
        ids: &mut IdGen,
    ) -> Result<Vec<Param>> {
        let mut rendered = Vec::with_capacity(slots.len());
        for (name, ty) in slots {
            rendered.push(Param {
                name: name
                    .as_ref()
                    .map(|n| Ident::new(ids.fresh(), n.clone())),
                ty: self.render(*ty, file, ids)?,
            });
        }
        Ok(rendered)
    }
}

/// Canonical spelling of a builtin; untyped constants take their default
/// typed form
fn basic_name(basic: BasicType) -> Result<&'static str> {
    let name = match basic {
        BasicType::Bool | BasicType::UntypedBool => "bool",
        BasicType::Int | BasicType::UntypedInt => "int",
        BasicType::Int8 => "int8",
        BasicType::Int16 => "int16",
        BasicType::Int32 => "int32",
        BasicType::Int64 => "int64",
        BasicType::Uint => "uint",
        BasicType::Uint8 => "uint8",
        BasicType::Uint16 => "uint16",
        BasicType::Uint32 => "uint32",
        BasicType::Uint64 => "uint64",
        BasicType::Uintptr => "uintptr",
        BasicType::Float32 => "float32",
        BasicType::Float64 | BasicType::UntypedFloat => "float64",
        BasicType::Complex64 | BasicType::UntypedComplex => "complex64",
        BasicType::Complex128 => "complex128",
        BasicType::Str | BasicType::UntypedString => "string",
        BasicType::UntypedRune => "rune",
        BasicType::UnsafePointer => {
            return Err(Error::UnsupportedType("unsafe.Pointer".to_string()));
        }
        BasicType::UntypedNil => {
            return Err(Error::UnsupportedType("untyped nil".to_string()));
        }
    };
    Ok(name)
}
