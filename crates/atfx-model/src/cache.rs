//! The schema and instance cache.
//!
//! [`AtfxCache`] is the single source of truth for the application schema and
//! all instance data of one session. Relation handling and model validation
//! live in their own modules, each extending `AtfxCache` with a further
//! `impl` block.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::base_model::{BaseElement, BaseModel};
use crate::datatype::DataType;
use crate::error::{AtfxError, AtfxResult};
use crate::instance::{Instance, InstanceCursor};
use crate::schema::{
    Aid, ApplicationAttribute, ApplicationElement, ApplicationRelation, AttrNo, Iid,
};
use crate::value::Value;

/// Base attribute name of the instance id attribute.
pub const BASE_ATTR_ID: &str = "id";

/// Base attribute name of the instance name attribute.
pub const BASE_ATTR_NAME: &str = "name";

/// In-memory store of application schema and instance data.
///
/// All operations are synchronous and side-effect free outside of the cache
/// itself. The cache performs no internal locking; callers serialize
/// mutations (one cache per session).
///
/// # Example
///
/// ```rust
/// use atfx_model::{AtfxCache, BaseModel, Value};
///
/// let mut cache = AtfxCache::new(BaseModel::asam_ods().unwrap());
/// let aid = cache.create_element("AoTest", "Test").unwrap();
/// let name = cache.add_attribute(aid, "iname", Some("name")).unwrap();
///
/// let iid = cache.create_instance(aid).unwrap();
/// cache.set_value(aid, iid, name, Value::String("run 1".into())).unwrap();
/// assert_eq!(
///     cache.get_value(aid, iid, name).unwrap(),
///     Some(&Value::String("run 1".into()))
/// );
/// ```
#[derive(Debug, Clone)]
pub struct AtfxCache {
    pub(crate) base_model: Arc<BaseModel>,
    pub(crate) elements: BTreeMap<Aid, ApplicationElement>,
    pub(crate) element_names: HashMap<String, Aid>,
    pub(crate) next_aid: Aid,
    pub(crate) relations: Vec<Option<ApplicationRelation>>,
    pub(crate) instances: HashMap<Aid, BTreeMap<Iid, Instance>>,
}

impl AtfxCache {
    /// Creates an empty cache over the given base model.
    pub fn new(base_model: BaseModel) -> Self {
        Self::with_shared_base_model(Arc::new(base_model))
    }

    /// Creates an empty cache sharing an already loaded base model.
    pub fn with_shared_base_model(base_model: Arc<BaseModel>) -> Self {
        Self {
            base_model,
            elements: BTreeMap::new(),
            element_names: HashMap::new(),
            next_aid: 1,
            relations: Vec::new(),
            instances: HashMap::new(),
        }
    }

    /// Returns the base model.
    pub fn base_model(&self) -> &BaseModel {
        &self.base_model
    }

    // =========================================================================
    // Application elements
    // =========================================================================

    /// Creates an application element derived from `base_name`.
    ///
    /// Element ids are assigned monotonically and never reused.
    pub fn create_element(&mut self, base_name: &str, name: &str) -> AtfxResult<Aid> {
        let base = self
            .base_model
            .element(base_name)
            .ok_or_else(|| AtfxError::not_found(format!("base element '{}'", base_name)))?;
        if self.element_names.contains_key(name) {
            return Err(AtfxError::duplicate(format!("application element '{}'", name)));
        }

        let aid = self.next_aid;
        self.next_aid += 1;
        let element = ApplicationElement::new(aid, name.to_string(), base.name.clone());
        self.elements.insert(aid, element);
        self.element_names.insert(name.to_string(), aid);
        self.instances.insert(aid, BTreeMap::new());
        debug!(aid, name, base = %base_name, "created application element");
        Ok(aid)
    }

    /// Renames an application element.
    pub fn rename_element(&mut self, aid: Aid, new_name: &str) -> AtfxResult<()> {
        if let Some(&other) = self.element_names.get(new_name) {
            if other == aid {
                return Ok(());
            }
            return Err(AtfxError::duplicate(format!(
                "application element '{}'",
                new_name
            )));
        }
        let element = self.element_mut(aid)?;
        let old_name = std::mem::replace(&mut element.name, new_name.to_string());
        self.element_names.remove(&old_name);
        self.element_names.insert(new_name.to_string(), aid);
        Ok(())
    }

    /// Removes an application element with its attributes, relations
    /// (including inverses), instances and every link to them.
    pub fn remove_element(&mut self, aid: Aid) -> AtfxResult<()> {
        self.element(aid)?;

        let iids = self.instance_iids(aid)?;
        for iid in &iids {
            self.remove_instance(aid, *iid)?;
        }

        let touching: Vec<_> = self
            .relations
            .iter()
            .flatten()
            .filter(|r| r.elem1 == Some(aid) || r.elem2 == Some(aid))
            .map(|r| r.id)
            .collect();
        for rel in touching {
            // the inverse of an earlier entry may already be gone
            if self.relation(rel).is_ok() {
                self.remove_relation(rel)?;
            }
        }

        if let Some(element) = self.elements.remove(&aid) {
            self.element_names.remove(&element.name);
            debug!(
                aid,
                name = %element.name,
                instances = iids.len(),
                "removed application element"
            );
        }
        self.instances.remove(&aid);
        Ok(())
    }

    /// Returns an application element.
    pub fn element(&self, aid: Aid) -> AtfxResult<&ApplicationElement> {
        self.elements
            .get(&aid)
            .ok_or_else(|| AtfxError::not_found(format!("application element {}", aid)))
    }

    pub(crate) fn element_mut(&mut self, aid: Aid) -> AtfxResult<&mut ApplicationElement> {
        self.elements
            .get_mut(&aid)
            .ok_or_else(|| AtfxError::not_found(format!("application element {}", aid)))
    }

    /// Looks up an application element by name.
    pub fn element_by_name(&self, name: &str) -> AtfxResult<&ApplicationElement> {
        self.element_names
            .get(name)
            .and_then(|aid| self.elements.get(aid))
            .ok_or_else(|| AtfxError::not_found(format!("application element '{}'", name)))
    }

    /// Returns all application elements ordered by id.
    pub fn elements(&self) -> impl Iterator<Item = &ApplicationElement> {
        self.elements.values()
    }

    /// Returns the elements derived from a base element (case-insensitive).
    pub fn elements_by_base(&self, base_name: &str) -> Vec<&ApplicationElement> {
        self.elements
            .values()
            .filter(|e| e.base_name.eq_ignore_ascii_case(base_name))
            .collect()
    }

    /// Returns the base element an application element derives from.
    pub fn base_element_of(&self, aid: Aid) -> AtfxResult<&BaseElement> {
        let element = self.element(aid)?;
        self.base_model.element(&element.base_name).ok_or_else(|| {
            AtfxError::not_found(format!("base element '{}'", element.base_name))
        })
    }

    // =========================================================================
    // Application attributes
    // =========================================================================

    /// Adds an attribute to an element, optionally mapping a base attribute.
    ///
    /// Data type and flags default to the base attribute's; attributes
    /// without a base attribute default to `DT_STRING`.
    pub fn add_attribute(
        &mut self,
        aid: Aid,
        name: &str,
        base_name: Option<&str>,
    ) -> AtfxResult<AttrNo> {
        let base_attr = match base_name {
            Some(base_name) => {
                let base = self.base_element_of(aid)?;
                let base_attr = base.attribute(base_name).cloned().ok_or_else(|| {
                    AtfxError::not_found(format!(
                        "base attribute '{}' of '{}'",
                        base_name, base.name
                    ))
                })?;
                Some(base_attr)
            }
            None => None,
        };
        if let Some(owner) = self.instance_attribute_owner(aid, name) {
            return Err(AtfxError::duplicate(format!(
                "application attribute '{}' collides with an instance attribute of instance {}",
                name, owner
            )));
        }
        let data_type = base_attr
            .as_ref()
            .map_or(DataType::DtString, |b| b.data_type);
        let is_id = base_attr.as_ref().is_some_and(|b| b.name == BASE_ATTR_ID);
        let ids = if is_id {
            self.id_values(aid, data_type)?
        } else {
            Vec::new()
        };

        let element = self.element_mut(aid)?;
        if element.attribute_by_name(name).is_some() {
            return Err(AtfxError::duplicate(format!(
                "application attribute '{}' of '{}'",
                name, element.name
            )));
        }
        if let Some(ref b) = base_attr {
            if let Some(existing) = element.attribute_by_base_name(&b.name) {
                return Err(AtfxError::duplicate(format!(
                    "base attribute '{}' already mapped by '{}'",
                    b.name, existing.name
                )));
            }
        }

        let attr_no = element.next_attr_no;
        element.next_attr_no += 1;
        element.attributes.push(ApplicationAttribute {
            attr_no,
            name: name.to_string(),
            base_name: base_attr.as_ref().map(|b| b.name.clone()),
            data_type,
            length: 0,
            obligatory: base_attr.as_ref().is_some_and(|b| b.obligatory),
            unique: base_attr.as_ref().is_some_and(|b| b.unique),
        });

        self.store_ids(aid, attr_no, ids);
        Ok(attr_no)
    }

    /// Returns an attribute.
    pub fn attribute(&self, aid: Aid, attr_no: AttrNo) -> AtfxResult<&ApplicationAttribute> {
        let element = self.element(aid)?;
        element.attribute(attr_no).ok_or_else(|| {
            AtfxError::not_found(format!(
                "attribute number {} of '{}'",
                attr_no, element.name
            ))
        })
    }

    fn attribute_mut(&mut self, aid: Aid, attr_no: AttrNo) -> AtfxResult<&mut ApplicationAttribute> {
        let element = self.element_mut(aid)?;
        let element_name = element.name.clone();
        element.attribute_mut(attr_no).ok_or_else(|| {
            AtfxError::not_found(format!(
                "attribute number {} of '{}'",
                attr_no, element_name
            ))
        })
    }

    /// Returns the attributes of an element in creation order.
    pub fn attributes(&self, aid: Aid) -> AtfxResult<&[ApplicationAttribute]> {
        Ok(self.element(aid)?.attributes())
    }

    /// Looks up an attribute number by attribute name.
    pub fn attr_no_by_name(&self, aid: Aid, name: &str) -> AtfxResult<AttrNo> {
        let element = self.element(aid)?;
        element
            .attribute_by_name(name)
            .map(|a| a.attr_no)
            .ok_or_else(|| {
                AtfxError::not_found(format!("attribute '{}' of '{}'", name, element.name))
            })
    }

    /// Looks up the attribute number mapping a base attribute.
    pub fn attr_no_by_base_name(&self, aid: Aid, base_name: &str) -> AtfxResult<AttrNo> {
        let element = self.element(aid)?;
        element
            .attribute_by_base_name(base_name)
            .map(|a| a.attr_no)
            .ok_or_else(|| {
                AtfxError::not_found(format!(
                    "base attribute '{}' of '{}'",
                    base_name, element.name
                ))
            })
    }

    /// Renames an attribute. Stored values stay keyed by the attribute number.
    pub fn rename_attribute(&mut self, aid: Aid, attr_no: AttrNo, new_name: &str) -> AtfxResult<()> {
        let element = self.element(aid)?;
        if let Some(other) = element.attribute_by_name(new_name) {
            if other.attr_no == attr_no {
                return Ok(());
            }
            return Err(AtfxError::duplicate(format!(
                "application attribute '{}' of '{}'",
                new_name, element.name
            )));
        }
        if let Some(owner) = self.instance_attribute_owner(aid, new_name) {
            return Err(AtfxError::duplicate(format!(
                "application attribute '{}' collides with an instance attribute of instance {}",
                new_name, owner
            )));
        }
        self.attribute_mut(aid, attr_no)?.name = new_name.to_string();
        Ok(())
    }

    /// Sets the data type of an attribute.
    ///
    /// The `id` attribute only accepts `DT_LONGLONG` or `DT_LONG`; its stored
    /// values are converted along with the type.
    pub fn set_attribute_data_type(
        &mut self,
        aid: Aid,
        attr_no: AttrNo,
        data_type: DataType,
    ) -> AtfxResult<()> {
        let ids = if self.attribute(aid, attr_no)?.is_base(BASE_ATTR_ID) {
            Some(self.id_values(aid, data_type)?)
        } else {
            None
        };
        self.attribute_mut(aid, attr_no)?.data_type = data_type;
        if let Some(ids) = ids {
            self.store_ids(aid, attr_no, ids);
        }
        Ok(())
    }

    /// Sets the maximum length of an attribute.
    pub fn set_attribute_length(&mut self, aid: Aid, attr_no: AttrNo, length: i32) -> AtfxResult<()> {
        if length < 0 {
            return Err(AtfxError::bad_parameter(format!(
                "attribute length must not be negative: {}",
                length
            )));
        }
        self.attribute_mut(aid, attr_no)?.length = length;
        Ok(())
    }

    /// Sets the obligatory flag of an attribute.
    pub fn set_attribute_obligatory(
        &mut self,
        aid: Aid,
        attr_no: AttrNo,
        obligatory: bool,
    ) -> AtfxResult<()> {
        self.attribute_mut(aid, attr_no)?.obligatory = obligatory;
        Ok(())
    }

    /// Sets the unique flag of an attribute.
    pub fn set_attribute_unique(&mut self, aid: Aid, attr_no: AttrNo, unique: bool) -> AtfxResult<()> {
        self.attribute_mut(aid, attr_no)?.unique = unique;
        Ok(())
    }

    /// Removes an attribute and purges its values from every instance.
    pub fn remove_attribute(&mut self, aid: Aid, attr_no: AttrNo) -> AtfxResult<()> {
        self.attribute(aid, attr_no)?;
        let element = self.element_mut(aid)?;
        element.attributes.retain(|a| a.attr_no != attr_no);
        if let Some(instances) = self.instances.get_mut(&aid) {
            for inst in instances.values_mut() {
                inst.values.remove(&attr_no);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Creates an instance and returns its id.
    ///
    /// The id is the highest existing id of the element plus one, or 1 when
    /// the element has no instances; removing the highest instance therefore
    /// frees its id for reuse.
    pub fn create_instance(&mut self, aid: Aid) -> AtfxResult<Iid> {
        let element = self.element(aid)?;
        let id_attr = element
            .attribute_by_base_name(BASE_ATTR_ID)
            .map(|a| (a.attr_no, a.data_type));
        let links: Vec<_> = element
            .relations
            .iter()
            .copied()
            .filter(|r| self.relation(*r).is_ok_and(|rel| rel.is_bound()))
            .collect();

        let instances = self.instances.entry(aid).or_default();
        let iid = instances.keys().next_back().map_or(1, |max| max + 1);
        let mut instance = Instance::with_relations(links);
        if let Some((attr_no, data_type)) = id_attr {
            instance.values.insert(attr_no, id_value(data_type, iid)?);
        }
        instances.insert(iid, instance);
        Ok(iid)
    }

    /// Removes an instance: severs every relation link in both directions,
    /// then drops its values.
    pub fn remove_instance(&mut self, aid: Aid, iid: Iid) -> AtfxResult<()> {
        let links: Vec<_> = self
            .instance(aid, iid)?
            .links
            .iter()
            .flat_map(|(rel, targets)| targets.iter().map(move |t| (*rel, *t)))
            .collect();
        for (rel, target) in links {
            self.disconnect(rel, iid, target)?;
        }
        if let Some(instances) = self.instances.get_mut(&aid) {
            instances.remove(&iid);
        }
        Ok(())
    }

    pub(crate) fn instance(&self, aid: Aid, iid: Iid) -> AtfxResult<&Instance> {
        self.instances
            .get(&aid)
            .ok_or_else(|| AtfxError::not_found(format!("application element {}", aid)))?
            .get(&iid)
            .ok_or_else(|| AtfxError::not_found(format!("instance {} of element {}", iid, aid)))
    }

    pub(crate) fn instance_mut(&mut self, aid: Aid, iid: Iid) -> AtfxResult<&mut Instance> {
        self.instances
            .get_mut(&aid)
            .ok_or_else(|| AtfxError::not_found(format!("application element {}", aid)))?
            .get_mut(&iid)
            .ok_or_else(|| AtfxError::not_found(format!("instance {} of element {}", iid, aid)))
    }

    /// Returns true if the instance exists.
    pub fn instance_exists(&self, aid: Aid, iid: Iid) -> bool {
        self.instances
            .get(&aid)
            .is_some_and(|instances| instances.contains_key(&iid))
    }

    /// Returns a sorted snapshot of all instance ids of an element.
    pub fn instance_iids(&self, aid: Aid) -> AtfxResult<Vec<Iid>> {
        self.element(aid)?;
        Ok(self
            .instances
            .get(&aid)
            .map(|instances| instances.keys().copied().collect())
            .unwrap_or_default())
    }

    /// Returns the number of instances of an element.
    pub fn instance_count(&self, aid: Aid) -> AtfxResult<usize> {
        self.element(aid)?;
        Ok(self.instances.get(&aid).map_or(0, |m| m.len()))
    }

    /// Returns a cursor over a snapshot of the element's instance ids.
    pub fn instance_cursor(&self, aid: Aid) -> AtfxResult<InstanceCursor> {
        Ok(InstanceCursor::new(aid, self.instance_iids(aid)?))
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Returns the value of an attribute, `None` when unset.
    pub fn get_value(&self, aid: Aid, iid: Iid, attr_no: AttrNo) -> AtfxResult<Option<&Value>> {
        self.attribute(aid, attr_no)?;
        Ok(self.instance(aid, iid)?.values.get(&attr_no))
    }

    /// Returns the value of the attribute mapping a base attribute.
    pub fn get_value_by_base_name(
        &self,
        aid: Aid,
        iid: Iid,
        base_name: &str,
    ) -> AtfxResult<Option<&Value>> {
        let attr_no = self.attr_no_by_base_name(aid, base_name)?;
        self.get_value(aid, iid, attr_no)
    }

    /// Sets the value of an attribute.
    ///
    /// The value must match the attribute's data type unless that is
    /// `DT_UNKNOWN`. The `id` attribute only accepts the instance's own id.
    pub fn set_value(&mut self, aid: Aid, iid: Iid, attr_no: AttrNo, value: Value) -> AtfxResult<()> {
        let attr = self.attribute(aid, attr_no)?;
        if attr.data_type != DataType::DtUnknown && attr.data_type != value.data_type() {
            return Err(AtfxError::bad_parameter(format!(
                "attribute '{}' expects {}, got {}",
                attr.name,
                attr.data_type,
                value.data_type()
            )));
        }
        if attr.is_base(BASE_ATTR_ID) && value.as_i64() != i64::try_from(iid).ok() {
            return Err(AtfxError::bad_parameter(format!(
                "id attribute '{}' of instance {} is read-only",
                attr.name, iid
            )));
        }
        self.instance_mut(aid, iid)?.values.insert(attr_no, value);
        Ok(())
    }

    /// Unsets the value of an attribute.
    pub fn unset_value(&mut self, aid: Aid, iid: Iid, attr_no: AttrNo) -> AtfxResult<()> {
        self.attribute(aid, attr_no)?;
        self.instance_mut(aid, iid)?.values.remove(&attr_no);
        Ok(())
    }

    // =========================================================================
    // Instance attributes
    // =========================================================================

    /// Sets a schema-free instance attribute, replacing an existing one of the
    /// same name and otherwise appending it.
    pub fn set_instance_attribute(
        &mut self,
        aid: Aid,
        iid: Iid,
        name: &str,
        value: Value,
    ) -> AtfxResult<()> {
        let element = self.element(aid)?;
        if element
            .attributes()
            .iter()
            .any(|a| a.name().eq_ignore_ascii_case(name))
        {
            return Err(AtfxError::duplicate(format!(
                "instance attribute '{}' collides with an application attribute of '{}'",
                name, element.name
            )));
        }
        let inst = self.instance_mut(aid, iid)?;
        match inst.instance_attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => inst.instance_attrs.push((name.to_string(), value)),
        }
        Ok(())
    }

    /// Returns a schema-free instance attribute.
    pub fn instance_attribute(&self, aid: Aid, iid: Iid, name: &str) -> AtfxResult<&Value> {
        self.instance(aid, iid)?
            .instance_attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| {
                AtfxError::not_found(format!("instance attribute '{}' of instance {}", name, iid))
            })
    }

    /// Returns the names of the instance attributes in insertion order.
    pub fn instance_attribute_names(&self, aid: Aid, iid: Iid) -> AtfxResult<Vec<&str>> {
        Ok(self
            .instance(aid, iid)?
            .instance_attrs
            .iter()
            .map(|(n, _)| n.as_str())
            .collect())
    }

    /// Removes a schema-free instance attribute.
    pub fn remove_instance_attribute(&mut self, aid: Aid, iid: Iid, name: &str) -> AtfxResult<()> {
        let inst = self.instance_mut(aid, iid)?;
        let before = inst.instance_attrs.len();
        inst.instance_attrs.retain(|(n, _)| n != name);
        if inst.instance_attrs.len() == before {
            return Err(AtfxError::not_found(format!(
                "instance attribute '{}' of instance {}",
                name, iid
            )));
        }
        Ok(())
    }
}

impl AtfxCache {
    /// Returns an instance of `aid` carrying an instance attribute named
    /// `name` (ASCII case-insensitive).
    fn instance_attribute_owner(&self, aid: Aid, name: &str) -> Option<Iid> {
        self.instances
            .get(&aid)?
            .iter()
            .find(|(_, inst)| {
                inst.instance_attrs
                    .iter()
                    .any(|(n, _)| n.eq_ignore_ascii_case(name))
            })
            .map(|(iid, _)| *iid)
    }

    /// Ids of every instance of `aid` as values of an `id` attribute of
    /// `data_type`.
    fn id_values(&self, aid: Aid, data_type: DataType) -> AtfxResult<Vec<(Iid, Value)>> {
        self.instances
            .get(&aid)
            .into_iter()
            .flat_map(|instances| instances.keys())
            .map(|&iid| id_value(data_type, iid).map(|value| (iid, value)))
            .collect()
    }

    fn store_ids(&mut self, aid: Aid, attr_no: AttrNo, ids: Vec<(Iid, Value)>) {
        let Some(instances) = self.instances.get_mut(&aid) else {
            return;
        };
        for (iid, value) in ids {
            if let Some(inst) = instances.get_mut(&iid) {
                inst.values.insert(attr_no, value);
            }
        }
    }
}

/// Instance id as a value of the `id` attribute's data type.
fn id_value(data_type: DataType, iid: Iid) -> AtfxResult<Value> {
    let out_of_range =
        || AtfxError::bad_parameter(format!("instance id {} does not fit {}", iid, data_type));
    match data_type {
        DataType::DtLongLong | DataType::DtUnknown => {
            i64::try_from(iid).map(Value::LongLong).map_err(|_| out_of_range())
        }
        DataType::DtLong => i32::try_from(iid).map(Value::Long).map_err(|_| out_of_range()),
        other => Err(AtfxError::bad_parameter(format!(
            "id attribute cannot hold {} values",
            other
        ))),
    }
}
