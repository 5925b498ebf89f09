//! Host-side class metadata.
//!
//! Every host value carries a [`HostType`]. Builtin classes wrap the
//! scalar and container tags; embedders register foreign object classes
//! on top of the object bases.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use varbridge_abi::{TAG_COUNT, VariantTag};

use crate::error::BridgeResult;
use crate::host::value::HostValue;
use crate::host::runtime::Runtime;

pub type HostType = Rc<HostClass>;

/// Conversion applied to a value after casting when a target class asks
/// for a representation change.
pub type ConvertFn = fn(&Runtime, &HostValue) -> BridgeResult<HostValue>;

pub struct HostClass {
    pub name: String,
    pub base: Option<HostType>,
    /// Instances participate in the foreign refcount protocol.
    pub refcounted: bool,
    /// Tag this class is the canonical host wrapper for, if any.
    pub wrapper_tag: Option<VariantTag>,
    /// Text of this class converts eagerly to owned host strings.
    pub is_native_text: bool,
    /// Instances are foreign object bindings.
    pub is_object: bool,
    pub convert: Option<ConvertFn>,
}

impl HostClass {
    /// Walks the base chain looking for `ancestor`.
    pub fn is_subclass_of(self: &HostType, ancestor: &HostType) -> bool {
        let mut cur = Some(self.clone());
        while let Some(class) = cur {
            if Rc::ptr_eq(&class, ancestor) {
                return true;
            }
            cur = class.base.clone();
        }
        false
    }

    /// Nearest wrapper tag on the base chain, if any class up the chain
    /// wraps one.
    pub fn chain_wrapper_tag(self: &HostType) -> Option<VariantTag> {
        let mut cur = Some(self.clone());
        while let Some(class) = cur {
            if let Some(tag) = class.wrapper_tag {
                return Some(tag);
            }
            cur = class.base.clone();
        }
        None
    }

}

impl std::fmt::Debug for HostClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostClass").field("name", &self.name).finish()
    }
}

/// All classes known to one runtime.
pub struct ClassRegistry {
    by_name: FxHashMap<String, HostType>,
    wrapper_by_tag: [Option<HostType>; TAG_COUNT],
    pub none_class: HostType,
    pub bool_class: HostType,
    pub int_class: HostType,
    pub float_class: HostType,
    pub str_class: HostType,
    pub istr_class: HostType,
    pub list_class: HostType,
    pub dict_class: HostType,
    pub func_class: HostType,
    pub boxed_class: HostType,
    /// Base for bindings to plain foreign objects. The host owns these.
    pub object_base: HostType,
    /// Base for bindings to reference-counted foreign objects.
    pub refcounted_base: HostType,
}

fn builtin(name: &str, wrapper_tag: Option<VariantTag>, is_native_text: bool) -> HostType {
    Rc::new(HostClass {
        name: name.to_owned(),
        base: None,
        refcounted: false,
        wrapper_tag,
        is_native_text,
        is_object: false,
        convert: None,
    })
}

impl ClassRegistry {
    pub fn new() -> Self {
        let none_class = builtin("NoneType", None, false);
        let bool_class = builtin("bool", Some(VariantTag::Bool), false);
        let int_class = builtin("int", Some(VariantTag::Int), false);
        let float_class = builtin("float", Some(VariantTag::Float), false);
        let str_class = builtin("str", Some(VariantTag::String), true);
        let istr_class = builtin("StringName", Some(VariantTag::StringName), false);
        let list_class = builtin("list", Some(VariantTag::Array), false);
        let dict_class = builtin("dict", Some(VariantTag::Dictionary), false);
        let func_class = builtin("function", Some(VariantTag::Callable), false);
        let boxed_class = builtin("Variant", None, false);
        let object_base = Rc::new(HostClass {
            name: "Object".to_owned(),
            base: None,
            refcounted: false,
            wrapper_tag: Some(VariantTag::Object),
            is_native_text: false,
            is_object: true,
            convert: None,
        });
        let refcounted_base = Rc::new(HostClass {
            name: "RefCounted".to_owned(),
            base: None,
            refcounted: true,
            wrapper_tag: Some(VariantTag::Object),
            is_native_text: false,
            is_object: true,
            convert: None,
        });

        let mut reg = Self {
            by_name: FxHashMap::default(),
            wrapper_by_tag: std::array::from_fn(|_| None),
            none_class,
            bool_class,
            int_class,
            float_class,
            str_class,
            istr_class,
            list_class,
            dict_class,
            func_class,
            boxed_class,
            object_base,
            refcounted_base,
        };

        for class in [
            reg.none_class.clone(),
            reg.bool_class.clone(),
            reg.int_class.clone(),
            reg.float_class.clone(),
            reg.str_class.clone(),
            reg.istr_class.clone(),
            reg.list_class.clone(),
            reg.dict_class.clone(),
            reg.func_class.clone(),
            reg.boxed_class.clone(),
            reg.object_base.clone(),
            reg.refcounted_base.clone(),
        ] {
            reg.insert(class);
        }
        reg
    }

    fn insert(&mut self, class: HostType) {
        if let Some(tag) = class.wrapper_tag {
            let slot = &mut self.wrapper_by_tag[tag as usize];
            if slot.is_none() {
                *slot = Some(class.clone());
            }
        }
        self.by_name.insert(class.name.clone(), class);
    }

    /// Registers a foreign object class deriving from one of the object
    /// bases (directly or through another registered class).
    pub fn register_object_class(&mut self, name: &str, base: HostType) -> HostType {
        debug_assert!(base.is_object);
        let class = Rc::new(HostClass {
            name: name.to_owned(),
            refcounted: base.refcounted,
            base: Some(base),
            wrapper_tag: None,
            is_native_text: false,
            is_object: true,
            convert: None,
        });
        self.insert(class.clone());
        class
    }

    pub fn lookup(&self, name: &str) -> Option<HostType> {
        self.by_name.get(name).cloned()
    }

    pub fn wrapper_for(&self, tag: VariantTag) -> Option<HostType> {
        self.wrapper_by_tag[tag as usize].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_wrappers_resolve_by_tag() {
        let reg = ClassRegistry::new();
        let class = reg.wrapper_for(VariantTag::Dictionary).unwrap();
        assert_eq!(class.name, "dict");
        assert!(reg.wrapper_for(VariantTag::Nil).is_none());
    }

    #[test]
    fn subclass_walk_reaches_bases() {
        let mut reg = ClassRegistry::new();
        let node = reg.register_object_class("Node", reg.object_base.clone());
        let node2d = reg.register_object_class("Node2D", node.clone());
        assert!(node2d.is_subclass_of(&node));
        assert!(node2d.is_subclass_of(&reg.object_base));
        assert!(!node.is_subclass_of(&node2d));
        assert_eq!(node2d.chain_wrapper_tag(), Some(VariantTag::Object));
    }

    #[test]
    fn refcounted_classes_inherit_protocol() {
        let mut reg = ClassRegistry::new();
        let res = reg.register_object_class("Resource", reg.refcounted_base.clone());
        assert!(res.refcounted);
        assert!(res.is_subclass_of(&reg.refcounted_base));
    }
}
