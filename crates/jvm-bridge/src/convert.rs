//! Value marshaling between host values and foreign values
//!
//! Conversions in both directions are driven by the declared signature of
//! the call site, never by inspecting the runtime class of a value.

use std::fmt;

use crate::error::{BridgeError, Result};
use crate::gateway::{ForeignValue, Frame};
use crate::handle::{NativeHandle, RefKind};
use crate::lifecycle::VmHandle;
use crate::native::PrimitiveArray;
use crate::proxy::InstanceProxy;
use crate::signature::{ReturnKind, TypeSig};

/// A value on the scripting side of the bridge
#[derive(Debug, Clone)]
pub enum HostValue {
    /// `null` / `None`
    Null,
    /// Boolean
    Bool(bool),
    /// Integer up to 64 bits
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text
    Str(String),
    /// Sequence, marshaled as a foreign array
    List(Vec<HostValue>),
    /// A foreign object
    Object(InstanceProxy),
}

impl HostValue {
    /// Short type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "str",
            HostValue::List(_) => "list",
            HostValue::Object(_) => "object",
        }
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// The boolean, if this is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float, if this is one
    pub fn as_float(&self) -> Option<f64> {
        match self {
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The text, if this is text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The items, if this is a list
    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// The proxy, if this is a foreign object
    pub fn as_object(&self) -> Option<&InstanceProxy> {
        match self {
            HostValue::Object(proxy) => Some(proxy),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::List(a), HostValue::List(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => a.same_ref(b),
            _ => false,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "null"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Int(i) => write!(f, "{}", i),
            HostValue::Float(x) => write!(f, "{}", x),
            HostValue::Str(s) => write!(f, "{:?}", s),
            HostValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            HostValue::Object(proxy) => write!(f, "<{}>", proxy.class_name().unwrap_or_default()),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        HostValue::Int(i64::from(i))
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Int(i)
    }
}

impl From<f64> for HostValue {
    fn from(x: f64) -> Self {
        HostValue::Float(x)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::List(items)
    }
}

impl From<InstanceProxy> for HostValue {
    fn from(proxy: InstanceProxy) -> Self {
        HostValue::Object(proxy)
    }
}

/// Reference types that accept any boxed primitive or string
pub(crate) const UNIVERSAL_REFS: &[&str] = &["java/lang/Object", "java/io/Serializable", "java/lang/Comparable"];

pub(crate) fn is_universal(sig: &TypeSig) -> bool {
    UNIVERSAL_REFS.iter().any(|name| sig.is_class(name))
}

fn mismatch(value: &HostValue, sig: &TypeSig) -> BridgeError {
    BridgeError::Conversion(format!("cannot convert {} {} to {}", value.type_name(), value, sig))
}

/// Converts values inside one call frame
pub struct TypeConverter<'a, 'g> {
    frame: &'a Frame<'g>,
    vm: &'a VmHandle,
}

impl<'a, 'g> TypeConverter<'a, 'g> {
    /// Converter for calls made through `frame`
    pub(crate) fn new(frame: &'a Frame<'g>, vm: &'a VmHandle) -> Self {
        Self { frame, vm }
    }

    /// The frame conversions run in
    pub(crate) fn frame(&self) -> &'a Frame<'g> {
        self.frame
    }

    /// Convert every argument to its parameter type
    pub(crate) fn arguments(&self, args: &[HostValue], params: &[TypeSig]) -> Result<Vec<ForeignValue>> {
        args.iter()
            .zip(params)
            .map(|(arg, sig)| self.to_foreign(arg, sig))
            .collect()
    }

    /// Host value to foreign value under the expected signature
    pub fn to_foreign(&self, value: &HostValue, sig: &TypeSig) -> Result<ForeignValue> {
        let converted = match (value, sig) {
            (HostValue::Null, s) if s.is_reference() => ForeignValue::NULL,

            (HostValue::Bool(b), TypeSig::Boolean) => ForeignValue::Boolean(*b),
            (HostValue::Int(i), TypeSig::Int) => ForeignValue::Int(narrow(value, sig, *i)?),
            (HostValue::Int(i), TypeSig::Long) => ForeignValue::Long(*i),
            (HostValue::Int(i), TypeSig::Short) => ForeignValue::Short(narrow(value, sig, *i)?),
            (HostValue::Int(i), TypeSig::Byte) => ForeignValue::Byte(narrow(value, sig, *i)?),
            (HostValue::Int(i), TypeSig::Char) => ForeignValue::Char(narrow(value, sig, *i)?),
            (HostValue::Int(i), TypeSig::Float) => ForeignValue::Float(*i as f32),
            (HostValue::Int(i), TypeSig::Double) => ForeignValue::Double(*i as f64),
            (HostValue::Float(x), TypeSig::Double) => ForeignValue::Double(*x),
            (HostValue::Float(x), TypeSig::Float) => {
                let narrowed = *x as f32;
                if x.is_finite() && !narrowed.is_finite() {
                    return Err(mismatch(value, sig));
                }
                ForeignValue::Float(narrowed)
            }
            (HostValue::Str(s), TypeSig::Char) => {
                let mut units = s.encode_utf16();
                match (units.next(), units.next()) {
                    (Some(unit), None) => ForeignValue::Char(unit),
                    _ => return Err(mismatch(value, sig)),
                }
            }

            (HostValue::List(items), TypeSig::Array(component)) => {
                ForeignValue::Object(Some(self.array_to_foreign(items, component)?))
            }
            (HostValue::Object(proxy), s) if s.is_reference() => {
                if proxy.global().vm_id() != self.frame.gateway().vm_id() {
                    return Err(BridgeError::Conversion("object belongs to another VM".to_string()));
                }
                let handle = proxy.handle();
                if !is_universal(s) {
                    let class = self.class_for(s)?;
                    if !self.frame.is_instance_of(Some(handle), class)? {
                        return Err(mismatch(value, sig));
                    }
                }
                ForeignValue::Object(Some(handle))
            }
            (_, TypeSig::Object(class)) => match self.box_value(value, class)? {
                Some(boxed) => boxed,
                None => return Err(mismatch(value, sig)),
            },
            _ => return Err(mismatch(value, sig)),
        };
        Ok(converted)
    }

    /// Foreign value to host value under the declared signature
    pub fn to_host(&self, value: ForeignValue, sig: &TypeSig) -> Result<HostValue> {
        let host = match value {
            ForeignValue::Void => HostValue::Null,
            ForeignValue::Boolean(b) => HostValue::Bool(b),
            ForeignValue::Byte(v) => HostValue::Int(i64::from(v)),
            ForeignValue::Short(v) => HostValue::Int(i64::from(v)),
            ForeignValue::Int(v) => HostValue::Int(i64::from(v)),
            ForeignValue::Long(v) => HostValue::Int(v),
            ForeignValue::Char(unit) => char_to_host(unit)?,
            ForeignValue::Float(v) => HostValue::Float(f64::from(v)),
            ForeignValue::Double(v) => HostValue::Float(v),
            ForeignValue::Object(None) => HostValue::Null,
            ForeignValue::Object(Some(handle)) => self.reference_to_host(handle, sig)?,
        };
        Ok(host)
    }

    fn reference_to_host(&self, handle: NativeHandle, sig: &TypeSig) -> Result<HostValue> {
        match sig {
            TypeSig::Object(class) if class == "java/lang/String" => Ok(HostValue::Str(self.frame.get_string(handle)?)),
            TypeSig::Object(class) => match unbox_method(class) {
                Some((name, descriptor, ret)) => {
                    let value = self.invoke(Some(handle), class, name, descriptor, ret, &[])?;
                    self.to_host(value, &TypeSig::parse_descriptor(&descriptor[2..])?)
                }
                None => self.wrap(handle),
            },
            TypeSig::Array(component) => self.array_to_host(handle, component),
            _ => self.wrap(handle),
        }
    }

    fn wrap(&self, handle: NativeHandle) -> Result<HostValue> {
        let global = self.frame.promote(handle)?;
        Ok(HostValue::Object(InstanceProxy::new(self.vm, global)))
    }

    fn class_for(&self, sig: &TypeSig) -> Result<NativeHandle> {
        let name = sig
            .class_name()
            .ok_or_else(|| BridgeError::Conversion(format!("{} is not a reference type", sig)))?;
        match sig {
            TypeSig::Object(_) => Ok(self.vm.find_class(&name)?.class_ref().handle()),
            _ => self.frame.find_class(&name),
        }
    }

    /// Call a method through the catalog; `target` `None` calls a static
    fn invoke(
        &self,
        target: Option<NativeHandle>,
        class: &str,
        name: &str,
        descriptor: &str,
        ret: ReturnKind,
        args: &[ForeignValue],
    ) -> Result<ForeignValue> {
        let class_desc = self.vm.find_class(class)?;
        let method = class_desc
            .methods()
            .iter()
            .find(|m| m.name() == name && m.descriptor() == descriptor)
            .cloned()
            .ok_or_else(|| BridgeError::MemberNotFound {
                class: class.replace('/', "."),
                member: name.to_string(),
            })?;
        let id = class_desc.method_id(self.frame, &method)?;
        match target {
            Some(target) => self.frame.call_method(target, id, ret, args),
            None => self
                .frame
                .call_static(class_desc.class_ref().handle(), id, ret, args),
        }
    }

    /// Box a primitive host value (or allocate a string) for a reference
    /// parameter. `None` if the class cannot hold the value.
    fn box_value(&self, value: &HostValue, class: &str) -> Result<Option<ForeignValue>> {
        let universal = UNIVERSAL_REFS.contains(&class);
        let boxed = match value {
            HostValue::Str(s) if universal || class == "java/lang/String" || class == "java/lang/CharSequence" => {
                ForeignValue::Object(Some(self.frame.new_string(s)?))
            }
            HostValue::Bool(b) if universal || class == "java/lang/Boolean" => self.invoke(
                None,
                "java/lang/Boolean",
                "valueOf",
                "(Z)Ljava/lang/Boolean;",
                ReturnKind::Object,
                &[ForeignValue::Boolean(*b)],
            )?,
            HostValue::Int(i) if class == "java/lang/Long" => self.invoke(
                None,
                "java/lang/Long",
                "valueOf",
                "(J)Ljava/lang/Long;",
                ReturnKind::Object,
                &[ForeignValue::Long(*i)],
            )?,
            HostValue::Int(i) if class == "java/lang/Integer" || universal || class == "java/lang/Number" => {
                match i32::try_from(*i) {
                    Ok(small) => self.invoke(
                        None,
                        "java/lang/Integer",
                        "valueOf",
                        "(I)Ljava/lang/Integer;",
                        ReturnKind::Object,
                        &[ForeignValue::Int(small)],
                    )?,
                    Err(_) if class != "java/lang/Integer" => self.invoke(
                        None,
                        "java/lang/Long",
                        "valueOf",
                        "(J)Ljava/lang/Long;",
                        ReturnKind::Object,
                        &[ForeignValue::Long(*i)],
                    )?,
                    Err(_) => return Ok(None),
                }
            }
            HostValue::Float(x) if universal || class == "java/lang/Double" || class == "java/lang/Number" => self.invoke(
                None,
                "java/lang/Double",
                "valueOf",
                "(D)Ljava/lang/Double;",
                ReturnKind::Object,
                &[ForeignValue::Double(*x)],
            )?,
            _ => return Ok(None),
        };
        Ok(Some(boxed))
    }

    fn array_to_foreign(&self, items: &[HostValue], component: &TypeSig) -> Result<NativeHandle> {
        fn pick<T>(
            conv: &TypeConverter<'_, '_>,
            items: &[HostValue],
            sig: &TypeSig,
            extract: fn(ForeignValue) -> Option<T>,
        ) -> Result<Vec<T>> {
            items
                .iter()
                .map(|item| extract(conv.to_foreign(item, sig)?).ok_or_else(|| mismatch(item, sig)))
                .collect()
        }

        let primitive = match component {
            TypeSig::Boolean => Some(PrimitiveArray::Boolean(pick(self, items, component, |v| match v {
                ForeignValue::Boolean(b) => Some(b),
                _ => None,
            })?)),
            TypeSig::Byte => Some(PrimitiveArray::Byte(pick(self, items, component, |v| match v {
                ForeignValue::Byte(b) => Some(b),
                _ => None,
            })?)),
            TypeSig::Char => Some(PrimitiveArray::Char(pick(self, items, component, |v| match v {
                ForeignValue::Char(c) => Some(c),
                _ => None,
            })?)),
            TypeSig::Short => Some(PrimitiveArray::Short(pick(self, items, component, |v| match v {
                ForeignValue::Short(s) => Some(s),
                _ => None,
            })?)),
            TypeSig::Int => Some(PrimitiveArray::Int(pick(self, items, component, |v| match v {
                ForeignValue::Int(i) => Some(i),
                _ => None,
            })?)),
            TypeSig::Long => Some(PrimitiveArray::Long(pick(self, items, component, |v| match v {
                ForeignValue::Long(l) => Some(l),
                _ => None,
            })?)),
            TypeSig::Float => Some(PrimitiveArray::Float(pick(self, items, component, |v| match v {
                ForeignValue::Float(x) => Some(x),
                _ => None,
            })?)),
            TypeSig::Double => Some(PrimitiveArray::Double(pick(self, items, component, |v| match v {
                ForeignValue::Double(x) => Some(x),
                _ => None,
            })?)),
            TypeSig::Void => return Err(BridgeError::Conversion("void[] is not a type".to_string())),
            TypeSig::Object(_) | TypeSig::Array(_) => None,
        };
        if let Some(values) = primitive {
            return self.frame.new_primitive_array(&values);
        }

        let array = self.frame.new_object_array(items.len(), self.class_for(component)?)?;
        for (index, item) in items.iter().enumerate() {
            let element = self.to_foreign(item, component)?.handle();
            self.frame.set_array_element(array, index, element)?;
            if let Some(element) = element.filter(|h| h.kind() == RefKind::Local) {
                self.frame.delete_local(element);
            }
        }
        Ok(array)
    }

    fn array_to_host(&self, array: NativeHandle, component: &TypeSig) -> Result<HostValue> {
        if !component.is_reference() {
            let values = self.frame.primitive_array(array, component.return_kind())?;
            let items = match values {
                PrimitiveArray::Boolean(v) => v.into_iter().map(HostValue::Bool).collect(),
                PrimitiveArray::Byte(v) => v.into_iter().map(|x| HostValue::Int(i64::from(x))).collect(),
                PrimitiveArray::Char(v) => v.into_iter().map(char_to_host).collect::<Result<_>>()?,
                PrimitiveArray::Short(v) => v.into_iter().map(|x| HostValue::Int(i64::from(x))).collect(),
                PrimitiveArray::Int(v) => v.into_iter().map(|x| HostValue::Int(i64::from(x))).collect(),
                PrimitiveArray::Long(v) => v.into_iter().map(HostValue::Int).collect(),
                PrimitiveArray::Float(v) => v.into_iter().map(|x| HostValue::Float(f64::from(x))).collect(),
                PrimitiveArray::Double(v) => v.into_iter().map(HostValue::Float).collect(),
            };
            return Ok(HostValue::List(items));
        }

        let len = self.frame.array_length(array)?;
        let mut items = Vec::with_capacity(len);
        for index in 0..len {
            let element = self.frame.array_element(array, index)?;
            items.push(self.to_host(ForeignValue::Object(element), component)?);
            if let Some(element) = element {
                self.frame.delete_local(element);
            }
        }
        Ok(HostValue::List(items))
    }
}

/// A UTF-16 code unit as a one-character string. Lone surrogates have no
/// host representation.
fn char_to_host(unit: u16) -> Result<HostValue> {
    char::from_u32(u32::from(unit))
        .map(|c| HostValue::Str(c.to_string()))
        .ok_or_else(|| BridgeError::Conversion(format!("char {:#06x} is a lone surrogate", unit)))
}

/// Range-checked integer narrowing
fn narrow<T: TryFrom<i64>>(value: &HostValue, sig: &TypeSig, i: i64) -> Result<T> {
    T::try_from(i).map_err(|_| mismatch(value, sig))
}

/// Unboxing accessor of a wrapper class: name, descriptor, return kind
fn unbox_method(class: &str) -> Option<(&'static str, &'static str, ReturnKind)> {
    Some(match class {
        "java/lang/Boolean" => ("booleanValue", "()Z", ReturnKind::Boolean),
        "java/lang/Byte" => ("byteValue", "()B", ReturnKind::Byte),
        "java/lang/Character" => ("charValue", "()C", ReturnKind::Char),
        "java/lang/Short" => ("shortValue", "()S", ReturnKind::Short),
        "java/lang/Integer" => ("intValue", "()I", ReturnKind::Int),
        "java/lang/Long" => ("longValue", "()J", ReturnKind::Long),
        "java/lang/Float" => ("floatValue", "()F", ReturnKind::Float),
        "java/lang/Double" => ("doubleValue", "()D", ReturnKind::Double),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::lifecycle::LifecycleManager;
    use crate::sim::SimLauncher;

    fn running() -> (LifecycleManager, VmHandle) {
        let manager = LifecycleManager::new(SimLauncher::builder().build().unwrap(), Configuration::default());
        let vm = manager.start(Configuration::default()).unwrap();
        (manager, vm)
    }

    #[test]
    fn test_round_trip() {
        let (_manager, vm) = running();
        let frame = vm.gateway().frame().unwrap();
        let conv = TypeConverter::new(&frame, &vm);
        let cases = [
            (HostValue::Bool(true), TypeSig::Boolean),
            (HostValue::Bool(false), TypeSig::Boolean),
            (HostValue::Int(0), TypeSig::Int),
            (HostValue::Int(123456789), TypeSig::Int),
            (HostValue::Int(123456789), TypeSig::Long),
            (HostValue::from(""), TypeSig::string()),
            (HostValue::from("hello"), TypeSig::string()),
            (HostValue::Null, TypeSig::string()),
            (HostValue::Null, TypeSig::object()),
            (HostValue::Float(1.5), TypeSig::Double),
            (HostValue::from("x"), TypeSig::Char),
        ];
        for (value, sig) in cases {
            let foreign = conv.to_foreign(&value, &sig).unwrap();
            assert_eq!(conv.to_host(foreign, &sig).unwrap(), value, "{}", sig);
        }
    }

    #[test]
    fn test_out_of_range_is_a_conversion_error() {
        let (_manager, vm) = running();
        let frame = vm.gateway().frame().unwrap();
        let conv = TypeConverter::new(&frame, &vm);
        assert!(matches!(
            conv.to_foreign(&HostValue::Int(1 << 40), &TypeSig::Int),
            Err(BridgeError::Conversion(_))
        ));
        assert!(conv.to_foreign(&HostValue::Int(300), &TypeSig::Byte).is_err());
        assert!(conv.to_foreign(&HostValue::Int(-1), &TypeSig::Char).is_err());
        assert!(conv.to_foreign(&HostValue::Null, &TypeSig::Int).is_err());
        assert!(conv.to_foreign(&HostValue::from("ab"), &TypeSig::Char).is_err());
        assert!(conv.to_foreign(&HostValue::Float(1e300), &TypeSig::Float).is_err());
        assert!(conv.to_foreign(&HostValue::Bool(true), &TypeSig::Int).is_err());
    }

    #[test]
    fn test_boxing_follows_declared_signature() {
        let (_manager, vm) = running();
        let frame = vm.gateway().frame().unwrap();
        let conv = TypeConverter::new(&frame, &vm);
        let integer = TypeSig::Object("java/lang/Integer".to_string());
        let boxed = conv.to_foreign(&HostValue::Int(42), &integer).unwrap();
        assert_eq!(conv.to_host(boxed, &integer).unwrap(), HostValue::Int(42));

        // declared as Object: no unboxing, the caller gets a proxy
        let as_object = conv.to_foreign(&HostValue::Int(42), &TypeSig::object()).unwrap();
        let proxy = conv.to_host(as_object, &TypeSig::object()).unwrap();
        assert_eq!(proxy.as_object().unwrap().class_name().unwrap(), "java.lang.Integer");

        let boolean = TypeSig::Object("java/lang/Boolean".to_string());
        let boxed = conv.to_foreign(&HostValue::Bool(true), &boolean).unwrap();
        assert_eq!(conv.to_host(boxed, &boolean).unwrap(), HostValue::Bool(true));
    }

    #[test]
    fn test_arrays_become_lists() {
        let (_manager, vm) = running();
        let frame = vm.gateway().frame().unwrap();
        let conv = TypeConverter::new(&frame, &vm);

        let ints = TypeSig::Array(Box::new(TypeSig::Int));
        let value = HostValue::List(vec![HostValue::Int(1), HostValue::Int(-2)]);
        let foreign = conv.to_foreign(&value, &ints).unwrap();
        assert_eq!(conv.to_host(foreign, &ints).unwrap(), value);

        let strings = TypeSig::Array(Box::new(TypeSig::string()));
        let value = HostValue::List(vec![HostValue::from("a"), HostValue::Null, HostValue::from("c")]);
        let foreign = conv.to_foreign(&value, &strings).unwrap();
        assert_eq!(conv.to_host(foreign, &strings).unwrap(), value);

        assert!(conv
            .to_foreign(&HostValue::List(vec![HostValue::from("x")]), &ints)
            .is_err());
    }

    #[test]
    fn test_lone_surrogate_char_is_a_conversion_error() {
        let (_manager, vm) = running();
        let frame = vm.gateway().frame().unwrap();
        let conv = TypeConverter::new(&frame, &vm);
        assert_eq!(
            conv.to_host(ForeignValue::Char(0x00e9), &TypeSig::Char).unwrap(),
            HostValue::from("\u{e9}")
        );
        assert!(matches!(
            conv.to_host(ForeignValue::Char(0xd800), &TypeSig::Char),
            Err(BridgeError::Conversion(_))
        ));

        let chars = TypeSig::Array(Box::new(TypeSig::Char));
        let array = frame
            .new_primitive_array(&PrimitiveArray::Char(vec![0x61, 0xdc00]))
            .unwrap();
        assert!(matches!(
            conv.to_host(ForeignValue::Object(Some(array)), &chars),
            Err(BridgeError::Conversion(_))
        ));
    }
}
