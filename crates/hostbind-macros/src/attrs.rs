//! Parsing of `#[hostbind(...)]` attributes.

use syn::{Attribute, LitStr};

/// How copies of a bound type are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyAttr {
    #[default]
    None,
    Bitwise,
    Clone,
}

/// Parsed `#[hostbind(...)]` attributes on a type.
#[derive(Debug, Default)]
pub struct TypeAttrs {
    pub copy: CopyAttr,
    pub shared: bool,
}

/// Parsed `#[hostbind(...)]` attributes on a field.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    pub get: bool,
    pub set: bool,
    pub name: Option<String>,
}

impl TypeAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("hostbind") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                let copy = if meta.path.is_ident("copy") {
                    CopyAttr::Bitwise
                } else if meta.path.is_ident("clone") {
                    CopyAttr::Clone
                } else if meta.path.is_ident("shared") {
                    result.shared = true;
                    return Ok(());
                } else {
                    return Err(meta.error(format!(
                        "unknown hostbind type attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                };
                if result.copy != CopyAttr::None {
                    return Err(meta.error("`copy` and `clone` are mutually exclusive"));
                }
                result.copy = copy;
                Ok(())
            })?;
        }

        Ok(result)
    }
}

impl FieldAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("hostbind") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("get") {
                    result.get = true;
                } else if meta.path.is_ident("set") {
                    result.set = true;
                } else if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.name = Some(value.value());
                } else {
                    return Err(meta.error(format!(
                        "unknown hostbind field attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }

    /// Whether the field is exposed at all.
    pub fn is_exposed(&self) -> bool {
        self.get || self.set
    }
}
