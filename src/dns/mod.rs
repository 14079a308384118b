//! Domain name resolution used to expand domain inputs into IP queries

pub mod resolver;

pub use resolver::{create_resolver, DomainResolver, HickoryResolver, ResolveError, Upstream};
