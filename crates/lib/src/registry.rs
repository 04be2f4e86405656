//! Named module factories, one registry per category ("external module", "python").

use std::fmt;

use crate::context::BuildContext;
use crate::module::{Module, ModuleBuilder, ModuleDescriptor};
use crate::platform::TargetSystem;

type Factory = Box<dyn Fn() -> Box<dyn Module> + Send + Sync>;

pub struct BuilderRegistry {
  category: String,
  available: Vec<(String, Factory)>,
}

impl BuilderRegistry {
  pub fn new(category: &str) -> Self {
    Self {
      category: category.to_string(),
      available: Vec::new(),
    }
  }

  /// Register `M` under its lower-cased type name (`Openssl` -> "openssl")
  pub fn register<M: Module + Default + 'static>(&mut self) -> &mut Self {
    let name = type_short_name::<M>().to_lowercase();
    self.register_named(&name, || Box::new(M::default()))
  }

  /// Register a factory under `name`, replacing (in place) any earlier registration
  pub fn register_named(
    &mut self,
    name: &str,
    factory: impl Fn() -> Box<dyn Module> + Send + Sync + 'static,
  ) -> &mut Self {
    let factory: Factory = Box::new(factory);
    match self.available.iter_mut().find(|(n, _)| n == name) {
      Some(entry) => entry.1 = factory,
      None => self.available.push((name.to_string(), factory)),
    }
    self
  }

  /// Registered names, in registration order
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.available.iter().map(|(name, _)| name.as_str())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.factory(name).is_some()
  }

  fn factory(&self, name: &str) -> Option<&Factory> {
    self.available.iter().find(|(n, _)| n == name).map(|(_, f)| f)
  }

  pub fn descriptor(&self, name: &str) -> Option<ModuleDescriptor> {
    self.factory(name).map(|factory| factory().descriptor())
  }

  /// A fresh builder for `name`, attached to `ctx`
  pub fn instantiate(&self, name: &str, ctx: &BuildContext) -> Option<ModuleBuilder> {
    self
      .factory(name)
      .map(|factory| ModuleBuilder::attach(name, factory(), ctx))
  }

  /// Names of modules that have a telltale, apply to `target`, and whose telltale is not on this host
  pub fn names_without_telltale<'a>(&'a self, target: &'a TargetSystem) -> impl Iterator<Item = &'a str> + 'a {
    self.available.iter().filter_map(move |(name, factory)| {
      let descriptor = factory().descriptor();
      let missing = descriptor.has_telltale()
        && target.is_applicable(&descriptor)
        && descriptor.existing_telltale(target).is_none();
      missing.then_some(name.as_str())
    })
  }
}

impl fmt::Display for BuilderRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let plural = if self.available.len() == 1 { "" } else { "s" };
    write!(f, "{} {} builder{}", self.available.len(), self.category, plural)
  }
}

impl fmt::Debug for BuilderRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuilderRegistry")
      .field("category", &self.category)
      .field("names", &self.names().collect::<Vec<_>>())
      .finish()
  }
}

fn type_short_name<T: ?Sized>() -> &'static str {
  let full = std::any::type_name::<T>();
  // Drop generic parameters, then the module path
  let base = full.split('<').next().unwrap_or(full);
  base.rsplit("::").next().unwrap_or(base)
}
