//! # atfx-model
//!
//! In-memory ASAM ODS application schema and instance cache.
//!
//! The cache stores application elements, attributes and bidirectional
//! relations derived from a fixed base metamodel, together with every
//! instance's attribute values and relation links.
//!
//! ## Quick Start
//!
//! ```ignore
//! use atfx_model::{AtfxCache, BaseModel, RelationDef, Value};
//!
//! let mut cache = AtfxCache::new(BaseModel::asam_ods()?);
//!
//! // schema first
//! let test = cache.create_element("AoTest", "Test")?;
//! let sub = cache.create_element("AoSubTest", "SubTest")?;
//! let name = cache.add_attribute(test, "iname", Some("name"))?;
//! let children = cache.add_relation(
//!     RelationDef::new("children", "parent_test", test, sub).with_base("children"),
//! )?;
//!
//! // then instances
//! let t = cache.create_instance(test)?;
//! let s = cache.create_instance(sub)?;
//! cache.set_value(test, t, name, Value::String("run 1".into()))?;
//! cache.link(test, t, children, &[s])?;
//!
//! cache.validate()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        atfx-model                            │
//! │                                                              │
//! │  AtfxCache                                                   │
//! │  ├── elements     aid → ApplicationElement (+ attributes)    │
//! │  ├── relations    arena of ApplicationRelation, by RelId     │
//! │  ├── instances    aid → iid → values, links                  │
//! │  └── base model   BaseModel (JSON, bundled ASAM ODS subset)  │
//! │                                                              │
//! │  link / unlink    single entry point, mirrors R and R'       │
//! │  validate         explicit model check, first violation      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod base_model;
mod cache;
mod datatype;
mod error;
mod instance;
mod relations;
mod schema;
mod validate;
mod value;

// Public re-exports
pub use base_model::{
    BaseAttribute, BaseElement, BaseModel, BaseRelation, RelationRange, RelationType,
};
pub use cache::{AtfxCache, BASE_ATTR_ID, BASE_ATTR_NAME};
pub use datatype::DataType;
pub use error::{AtfxError, AtfxResult, ErrorKind};
pub use instance::InstanceCursor;
pub use relations::father_child;
pub use schema::{
    Aid, ApplicationAttribute, ApplicationElement, ApplicationRelation, AttrNo, Iid, RelId,
    RelationDef, RelationState,
};
pub use validate::MAX_NAME_LENGTH;
pub use value::{Complex32, Complex64, ExternalReference, TypedValue, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _: Option<AtfxCache> = None;
        let _: Option<InstanceCursor> = None;
        let _: Option<TypedValue> = None;
        let _: Option<AtfxResult<()>> = None;
        let _: Option<RelationState> = None;
    }
}
