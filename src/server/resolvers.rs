//! Resolver registration for dynamic schemas
//!
//! Resolvers are registered against a `Type.field` path. Object types named in
//! paths are created on first use, so a whole schema can be described as a
//! flat list of resolvers:
//!
//! ```rust,ignore
//! let schema = ResolverMap::new()
//!     .resolve("Query.version", TypeRef::named_nn(TypeRef::STRING), |_| {
//!         FieldFuture::new(async { Ok(Some(FieldValue::value("1.0"))) })
//!     })
//!     .into_schema()?;
//! ```

use async_graphql::dynamic::{
    Field, FieldFuture, InputValue, Object, ResolverContext, Schema, SchemaBuilder, Type, TypeRef,
};

use crate::error::{Error, Result};

pub const QUERY: &str = "Query";
pub const MUTATION: &str = "Mutation";

/// Resolvers keyed by `Type.field` path, turned into a dynamic schema.
#[derive(Default)]
pub struct ResolverMap {
    objects: Vec<(String, Object)>,
    types: Vec<Type>,
    paths: Vec<String>,
    invalid: Vec<String>,
}

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver for `path` returning `ty`.
    pub fn resolve<F>(self, path: &str, ty: impl Into<TypeRef>, resolver: F) -> Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        self.resolve_with_args(path, ty, std::iter::empty(), resolver)
    }

    /// Register a resolver for `path` that takes arguments.
    pub fn resolve_with_args<F>(
        mut self,
        path: &str,
        ty: impl Into<TypeRef>,
        arguments: impl IntoIterator<Item = InputValue>,
        resolver: F,
    ) -> Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        let Some((type_name, field_name)) = split_path(path) else {
            self.invalid.push(path.to_string());
            return self;
        };
        if self.paths.iter().any(|p| p == path) {
            self.invalid.push(format!("{path} (registered twice)"));
            return self;
        }
        self.paths.push(path.to_string());

        let field = arguments
            .into_iter()
            .fold(Field::new(field_name, ty, resolver), Field::argument);
        match self.objects.iter_mut().find(|(name, _)| name == type_name) {
            Some((_, object)) => {
                let taken = std::mem::replace(object, Object::new(type_name));
                *object = taken.field(field);
            }
            None => self
                .objects
                .push((type_name.to_string(), Object::new(type_name).field(field))),
        }
        self
    }

    /// Register a type that is not built from paths: an enum, input object,
    /// interface or a hand-built object.
    pub fn register(mut self, ty: impl Into<Type>) -> Self {
        self.types.push(ty.into());
        self
    }

    /// Registered `Type.field` paths, in registration order
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// A schema builder with every resolver registered, for adding data or
    /// limits before [`SchemaBuilder::finish`].
    pub fn into_builder(self) -> Result<SchemaBuilder> {
        if !self.invalid.is_empty() {
            return Err(Error::Schema(format!(
                "invalid resolver paths: {}",
                self.invalid.join(", ")
            )));
        }
        if !self.objects.iter().any(|(name, _)| name == QUERY) {
            return Err(Error::Schema("no Query resolvers registered".to_string()));
        }

        let has_mutation = self.objects.iter().any(|(name, _)| name == MUTATION);
        let mut builder = Schema::build(QUERY, has_mutation.then_some(MUTATION), None);
        for (_, object) in self.objects {
            builder = builder.register(object);
        }
        for ty in self.types {
            builder = builder.register(ty);
        }

        tracing::debug!(resolvers = self.paths.len(), "Built resolver map");
        Ok(builder)
    }

    pub fn into_schema(self) -> Result<Schema> {
        Ok(self.into_builder()?.finish()?)
    }
}

impl std::fmt::Debug for ResolverMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverMap")
            .field("paths", &self.paths)
            .field("types", &self.types.len())
            .finish()
    }
}

fn split_path(path: &str) -> Option<(&str, &str)> {
    let (type_name, field_name) = path.split_once('.')?;
    let valid = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    (valid(type_name) && valid(field_name)).then_some((type_name, field_name))
}
