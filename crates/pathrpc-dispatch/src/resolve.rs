use crate::error::{PathError, RequestError};
use crate::registry::{Procedure, Registry};
use crate::value::TypeKey;

/// One path element matched against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedElement<'r> {
    pub name: String,
    /// Literal after the first hyphen, bound as the element's argument.
    pub inline_arg: Option<String>,
    pub procedure: &'r Procedure,
}

/// Split `path` on `/`, dropping empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|e| !e.is_empty()).collect()
}

/// Resolve `path` against `registry`, starting at the `root` type.
///
/// Pure lookup: nothing is invoked. Failures other than an empty path are
/// wrapped in a [`PathError`] naming the elements up to the failing one.
pub fn resolve_path<'r>(
    registry: &'r Registry,
    root: TypeKey,
    path: &str,
) -> Result<Vec<ResolvedElement<'r>>, RequestError> {
    let elements = split_path(path);
    if elements.is_empty() {
        return Err(RequestError::EmptyPath);
    }

    let mut resolved = Vec::with_capacity(elements.len());
    let mut current = Some(root);
    for (i, element) in elements.iter().enumerate() {
        let r = resolve_element(registry, current, element)
            .map_err(|reason| PathError::new(reason, &elements[..=i]))?;
        current = r.procedure.return_type();
        resolved.push(r);
    }
    Ok(resolved)
}

fn resolve_element<'r>(
    registry: &'r Registry,
    ty: Option<TypeKey>,
    element: &str,
) -> Result<ResolvedElement<'r>, String> {
    // A hyphen at position zero belongs to the name.
    let (name, inline_arg) = match element.find('-') {
        Some(hyphen) if hyphen > 0 => (&element[..hyphen], Some(&element[hyphen + 1..])),
        _ => (element, None),
    };

    let procedure = ty
        .and_then(|ty| registry.lookup(ty, name))
        .ok_or_else(|| "not found".to_string())?;

    if inline_arg.is_some() {
        match procedure.arg_type() {
            Some(arg) if arg.is_string() => {}
            other => {
                let declared = other.map_or("<none>", |arg| arg.key().name());
                return Err(format!(
                    "string argument given for inappropriate method/field: {declared}"
                ));
            }
        }
    }

    Ok(ResolvedElement {
        name: name.to_string(),
        inline_arg: inline_arg.map(str::to_string),
        procedure,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    struct Root;
    struct Foo;

    fn registry() -> Registry {
        let mut builder = Registry::builder();
        builder
            .register::<Root>()
            .object("foo", |_, _| Ok(Arc::new(Foo)))
            .method("count", |_, _, n: u32| Ok(n));
        builder
            .register::<Foo>()
            .method("bar", |_, _, s: String| Ok(s))
            .getter("-flag", |_, _| Ok(true));
        builder.build()
    }

    fn resolve<'r>(
        registry: &'r Registry,
        path: &str,
    ) -> Result<Vec<ResolvedElement<'r>>, RequestError> {
        resolve_path(registry, TypeKey::of::<Root>(), path)
    }

    fn path_error(err: RequestError) -> PathError {
        match err {
            RequestError::Path(err) => err,
            other => panic!("expected path error, got {other:?}"),
        }
    }

    #[test]
    fn resolves_chain_with_inline_argument() {
        let registry = registry();
        let resolved = resolve(&registry, "foo/bar-x").unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, "foo");
        assert_eq!(resolved[0].inline_arg, None);
        assert_eq!(resolved[1].name, "bar");
        assert_eq!(resolved[1].inline_arg.as_deref(), Some("x"));
    }

    #[test]
    fn resolution_is_repeatable() {
        let registry = registry();
        for path in ["foo", "foo/bar-x", "/foo//bar-a-b/", "count"] {
            assert_eq!(
                resolve(&registry, path).unwrap(),
                resolve(&registry, path).unwrap()
            );
        }
    }

    #[test]
    fn only_first_hyphen_splits() {
        let registry = registry();
        let resolved = resolve(&registry, "foo/bar-machine-0-lxd").unwrap();
        assert_eq!(resolved[1].inline_arg.as_deref(), Some("machine-0-lxd"));

        let resolved = resolve(&registry, "foo/bar-").unwrap();
        assert_eq!(resolved[1].inline_arg.as_deref(), Some(""));
    }

    #[test]
    fn leading_hyphen_is_part_of_name() {
        let registry = registry();
        let resolved = resolve(&registry, "foo/-flag").unwrap();
        assert_eq!(resolved[1].name, "-flag");
        assert!(resolved[1].inline_arg.is_none());
    }

    #[test]
    fn empty_path_has_no_error_path() {
        let registry = registry();
        for path in ["", "/", "///"] {
            let err = resolve(&registry, path).unwrap_err();
            assert!(matches!(err, RequestError::EmptyPath));
            assert_eq!(err.to_response(0).error_path, "");
        }
    }

    #[test]
    fn unknown_member_reports_prefix() {
        let registry = registry();
        let err = path_error(resolve(&registry, "foo/baz").unwrap_err());
        assert_eq!(err.reason.to_string(), "not found");
        assert_eq!(err.error_path(), "foo/baz");

        let err = path_error(resolve(&registry, "nope/bar").unwrap_err());
        assert_eq!(err.error_path(), "nope");
    }

    #[test]
    fn inline_argument_requires_string_parameter() {
        let registry = registry();
        let err = path_error(resolve(&registry, "count-3").unwrap_err());
        assert_eq!(err.error_path(), "count-3");
        assert_eq!(
            err.reason.to_string(),
            "string argument given for inappropriate method/field: u32"
        );

        let err = path_error(resolve(&registry, "foo-1/bar").unwrap_err());
        assert_eq!(err.error_path(), "foo-1");
        assert_eq!(
            err.reason.to_string(),
            "string argument given for inappropriate method/field: <none>"
        );
    }

    #[test]
    fn element_after_data_result_is_not_found() {
        let registry = registry();
        let err = path_error(resolve(&registry, "count/anything").unwrap_err());
        assert_eq!(err.reason.to_string(), "not found");
        assert_eq!(err.error_path(), "count/anything");
    }
}
