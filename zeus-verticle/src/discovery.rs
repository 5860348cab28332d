//! Verticle discovery
//!
//! Verticle types announce themselves with [`register_verticle!`]; a scan
//! picks the registrations declared under a set of base modules and adds them
//! to the [`CandidateRegistry`].
//!
//! ```ignore
//! mod api {
//!     pub struct Hello;
//!     // impl HttpVerticle, VerticleController, Injectable ...
//!     zeus_verticle::register_verticle!(Hello);
//! }
//!
//! let discovery = Discovery::new(registry.clone());
//! discovery.scan(&ScanDeclaration::new(module_path!()).base_package("my_app::api"))?;
//! ```
//!
//! [`register_verticle!`]: crate::register_verticle

use crate::descriptor::{ResolvedDescriptor, VerticleController, VerticleDescriptor};
use crate::error::DiscoveryError;
use crate::http_verticle::{HttpServerVerticle, HttpVerticle};
use crate::registry::CandidateRegistry;
use crate::verticle::Verticle;
use std::any::TypeId;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, warn};
use zeus_core::{Container, Error, Injectable};

/// Type-erased handle to a deployable verticle type
#[derive(Clone, Copy)]
pub struct VerticleType {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    descriptor: VerticleDescriptor,
    construct: fn(&Container, &ResolvedDescriptor) -> Result<Box<dyn Verticle>, Error>,
}

impl VerticleType {
    pub const fn of<T>() -> Self
    where
        T: HttpVerticle + VerticleController + Injectable,
    {
        Self {
            type_id: TypeId::of::<T>,
            type_name: std::any::type_name::<T>,
            descriptor: T::DESCRIPTOR,
            construct: construct_http::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Fully qualified type name
    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    pub fn descriptor(&self) -> &VerticleDescriptor {
        &self.descriptor
    }

    /// Build one instance, resolving the verticle's dependencies from `container`
    pub fn construct(
        &self,
        container: &Container,
        descriptor: &ResolvedDescriptor,
    ) -> Result<Box<dyn Verticle>, Error> {
        (self.construct)(container, descriptor)
    }

    /// Module the type is declared in
    pub fn module_path(&self) -> &'static str {
        module_of(self.type_name())
    }
}

fn construct_http<T>(
    container: &Container,
    descriptor: &ResolvedDescriptor,
) -> Result<Box<dyn Verticle>, Error>
where
    T: HttpVerticle + Injectable,
{
    Ok(Box::new(HttpServerVerticle::<T>::construct(container, descriptor)?))
}

impl PartialEq for VerticleType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for VerticleType {}

impl Hash for VerticleType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id().hash(state);
    }
}

impl fmt::Debug for VerticleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerticleType").field(&self.type_name()).finish()
    }
}

/// A link-time registration made by [`register_verticle!`](crate::register_verticle)
pub struct VerticleRegistration {
    pub module_path: &'static str,
    pub verticle: VerticleType,
}

inventory::collect!(VerticleRegistration);

/// Register a verticle type for discovery.
///
/// The registration records the module it is invoked from, which is what
/// base packages are matched against.
#[macro_export]
macro_rules! register_verticle {
    ($verticle:ty) => {
        $crate::inventory::submit! {
            $crate::VerticleRegistration {
                module_path: ::std::module_path!(),
                verticle: $crate::VerticleType::of::<$verticle>(),
            }
        }
    };
}

/// Where to look for verticles.
///
/// `value` and `base_package` entries are module paths; `base_package_class`
/// contributes the module its type is declared in. With nothing given, the
/// declaring module is scanned.
#[derive(Debug, Clone)]
pub struct ScanDeclaration {
    declaring_module: &'static str,
    value: Vec<String>,
    base_packages: Vec<String>,
    base_package_classes: Vec<&'static str>,
}

impl ScanDeclaration {
    /// Declare a scan from `module`, normally `module_path!()`
    pub fn new(module: &'static str) -> Self {
        Self {
            declaring_module: module,
            value: Vec::new(),
            base_packages: Vec::new(),
            base_package_classes: Vec::new(),
        }
    }

    pub fn value(mut self, base: impl Into<String>) -> Self {
        self.value.push(base.into());
        self
    }

    pub fn base_package(mut self, base: impl Into<String>) -> Self {
        self.base_packages.push(base.into());
        self
    }

    pub fn base_package_class<T: ?Sized>(mut self) -> Self {
        self.base_package_classes.push(module_of(std::any::type_name::<T>()));
        self
    }

    /// The deduplicated base modules to scan
    pub fn base_locations(&self) -> BTreeSet<String> {
        let mut bases: BTreeSet<String> = self
            .value
            .iter()
            .chain(&self.base_packages)
            .map(|base| base.trim())
            .chain(self.base_package_classes.iter().copied())
            .filter(|base| !base.is_empty())
            .map(str::to_string)
            .collect();

        if bases.is_empty() {
            bases.insert(self.declaring_module.to_string());
        }
        bases
    }
}

/// Scans registrations into a [`CandidateRegistry`]
pub struct Discovery {
    registry: Arc<CandidateRegistry>,
}

impl Discovery {
    pub fn new(registry: Arc<CandidateRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CandidateRegistry> {
        &self.registry
    }

    /// Scan every base location of `declaration`, returning how many new
    /// candidates were added
    pub fn scan(&self, declaration: &ScanDeclaration) -> Result<usize, DiscoveryError> {
        let bases = declaration.base_locations();
        for base in &bases {
            validate_base(base)?;
        }

        let mut added = 0;
        for base in &bases {
            added += self.scan_valid_base(base);
        }
        Ok(added)
    }

    pub fn scan_base_package(&self, base: &str) -> Result<usize, DiscoveryError> {
        validate_base(base)?;
        Ok(self.scan_valid_base(base))
    }

    /// Register a verticle type directly
    pub fn register<T>(&self) -> bool
    where
        T: HttpVerticle + VerticleController + Injectable,
    {
        self.register_type(VerticleType::of::<T>())
    }

    pub fn register_type(&self, verticle: VerticleType) -> bool {
        let added = self.registry.add(verticle);
        if added {
            debug!(verticle = verticle.type_name(), "Registered verticle candidate");
        }
        added
    }

    /// Registered verticle types declared under `base`
    pub fn candidates_in(base: &str) -> Vec<VerticleType> {
        inventory::iter::<VerticleRegistration>
            .into_iter()
            .filter(|registration| in_base(registration.module_path, base))
            .map(|registration| registration.verticle)
            .collect()
    }

    fn scan_valid_base(&self, base: &str) -> usize {
        let found = Self::candidates_in(base);
        if found.is_empty() {
            warn!(base, "No verticles found in base package");
            return 0;
        }

        let added = found.iter().filter(|v| self.register_type(**v)).count();
        debug!(base, found = found.len(), added, "Scanned base package");
        added
    }
}

fn in_base(module_path: &str, base: &str) -> bool {
    module_path == base
        || module_path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with("::"))
}

fn validate_base(base: &str) -> Result<(), DiscoveryError> {
    let valid = !base.is_empty()
        && base.split("::").all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(DiscoveryError::InvalidBasePackage(base.to_string()))
    }
}

/// Module part of a type name, ignoring generic arguments
fn module_of(type_name: &'static str) -> &'static str {
    let bare = type_name.split('<').next().unwrap_or(type_name);
    bare.rsplit_once("::").map_or("", |(module, _)| module)
}
