//! Simulated object heap
//!
//! Holds the class table and every object the simulated VM allocated. Class
//! bodies (see [`super::ClassBuilder`]) run against this heap.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::catalog::Modifiers;
use crate::signature::{MethodSig, TypeSig};

/// Heap object identifier
pub type ObjId = u64;

/// A value inside the simulated VM
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimValue {
    /// No value
    Void,
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `char`
    Char(u16),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// Reference, `None` is null
    Ref(Option<ObjId>),
}

impl SimValue {
    /// The null reference
    pub const NULL: SimValue = SimValue::Ref(None);

    /// Zero value of a type
    pub fn default_for(sig: &TypeSig) -> Self {
        match sig {
            TypeSig::Boolean => SimValue::Boolean(false),
            TypeSig::Byte => SimValue::Byte(0),
            TypeSig::Char => SimValue::Char(0),
            TypeSig::Short => SimValue::Short(0),
            TypeSig::Int => SimValue::Int(0),
            TypeSig::Long => SimValue::Long(0),
            TypeSig::Float => SimValue::Float(0.0),
            TypeSig::Double => SimValue::Double(0.0),
            TypeSig::Void => SimValue::Void,
            TypeSig::Object(_) | TypeSig::Array(_) => SimValue::NULL,
        }
    }

    /// Integral value widened to `i64`
    pub fn as_long(&self) -> Option<i64> {
        match *self {
            SimValue::Byte(v) => Some(v as i64),
            SimValue::Char(v) => Some(v as i64),
            SimValue::Short(v) => Some(v as i64),
            SimValue::Int(v) => Some(v as i64),
            SimValue::Long(v) => Some(v),
            _ => None,
        }
    }

    /// `int` value
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            SimValue::Int(v) => Some(v),
            SimValue::Short(v) => Some(v as i32),
            SimValue::Byte(v) => Some(v as i32),
            SimValue::Char(v) => Some(v as i32),
            _ => None,
        }
    }

    /// Numeric value widened to `f64`
    pub fn as_double(&self) -> Option<f64> {
        match *self {
            SimValue::Float(v) => Some(v as f64),
            SimValue::Double(v) => Some(v),
            _ => self.as_long().map(|v| v as f64),
        }
    }

    /// `boolean` value
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            SimValue::Boolean(v) => Some(v),
            _ => None,
        }
    }

    /// Referenced object, `None` for null or primitives
    pub fn as_ref(&self) -> Option<ObjId> {
        match *self {
            SimValue::Ref(r) => r,
            _ => None,
        }
    }
}

/// A throwable raised by a class body
#[derive(Debug, Clone, PartialEq)]
pub struct SimThrow {
    /// Internal class name of the throwable
    pub class: String,
    /// Detail message
    pub message: Option<String>,
}

impl SimThrow {
    /// Throwable of `class` with a message
    pub fn new(class: &str, message: impl Into<String>) -> Self {
        Self {
            class: class.to_string(),
            message: Some(message.into()),
        }
    }

    /// Throwable of `class` without a message
    pub fn bare(class: &str) -> Self {
        Self {
            class: class.to_string(),
            message: None,
        }
    }

    /// `NullPointerException`
    pub fn null_pointer() -> Self {
        Self::bare("java/lang/NullPointerException")
    }

    /// `IllegalArgumentException`
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new("java/lang/IllegalArgumentException", message)
    }
}

/// Result of a class body
pub type SimResult = Result<SimValue, SimThrow>;

/// Implementation of a simulated method or constructor. Receives the
/// receiver (`None` for static methods) and the arguments.
pub type NativeBody = Arc<dyn Fn(&mut SimHeap, Option<ObjId>, &[SimValue]) -> SimResult + Send + Sync>;

#[derive(Clone)]
pub(crate) struct SimMethod {
    pub name: String,
    pub sig: MethodSig,
    pub descriptor: String,
    pub modifiers: u32,
    pub body: Option<NativeBody>,
}

impl SimMethod {
    pub fn is_static(&self) -> bool {
        Modifiers(self.modifiers).is_static()
    }

    pub fn is_public(&self) -> bool {
        Modifiers(self.modifiers).is_public()
    }
}

impl std::fmt::Debug for SimMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimMethod")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("modifiers", &self.modifiers)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SimField {
    pub name: String,
    pub sig: TypeSig,
    pub modifiers: u32,
    pub initial: SimValue,
}

impl SimField {
    pub fn is_static(&self) -> bool {
        Modifiers(self.modifiers).is_static()
    }

    pub fn is_public(&self) -> bool {
        Modifiers(self.modifiers).is_public()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SimClass {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub modifiers: u32,
    pub methods: Vec<SimMethod>,
    pub constructors: Vec<SimMethod>,
    pub fields: Vec<SimField>,
    /// Loadable only when a classpath entry provides `name.class`
    pub requires_classpath: bool,
}

/// Runtime class of a heap value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ClassKind {
    Named(usize),
    Primitive(TypeSig),
    /// Array with the given component type
    Array(TypeSig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberKind {
    Method,
    Constructor,
    Field,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Payload {
    None,
    List(Vec<SimValue>),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) enum HeapObject {
    Instance {
        class: usize,
        fields: FxHashMap<String, SimValue>,
        payload: Payload,
    },
    Str(String),
    Class(ClassKind),
    Member {
        kind: MemberKind,
        class: usize,
        index: usize,
    },
    Array {
        component: TypeSig,
        items: Vec<SimValue>,
    },
}

/// The simulated heap: class table plus allocated objects
#[derive(Debug)]
pub struct SimHeap {
    pub(crate) classes: Vec<SimClass>,
    class_index: FxHashMap<String, usize>,
    objects: FxHashMap<ObjId, HeapObject>,
    next_obj: ObjId,
    class_objects: FxHashMap<ClassKind, ObjId>,
    statics: FxHashMap<(usize, String), SimValue>,
}

const OBJECT: &str = "java/lang/Object";

impl SimHeap {
    pub(crate) fn new(classes: Vec<SimClass>) -> Self {
        let mut class_index = FxHashMap::default();
        let mut statics = FxHashMap::default();
        for (idx, class) in classes.iter().enumerate() {
            class_index.insert(class.name.clone(), idx);
            for field in class.fields.iter().filter(|f| f.is_static()) {
                statics.insert((idx, field.name.clone()), field.initial);
            }
        }
        Self {
            classes,
            class_index,
            objects: FxHashMap::default(),
            next_obj: 0,
            class_objects: FxHashMap::default(),
            statics,
        }
    }

    fn alloc(&mut self, object: HeapObject) -> ObjId {
        self.next_obj += 1;
        self.objects.insert(self.next_obj, object);
        self.next_obj
    }

    pub(crate) fn object(&self, obj: ObjId) -> Option<&HeapObject> {
        self.objects.get(&obj)
    }

    pub(crate) fn class_idx(&self, name: &str) -> Option<usize> {
        self.class_index.get(name).copied()
    }

    fn builtin(&self, name: &str) -> usize {
        self.class_idx(name).unwrap_or(0)
    }

    pub(crate) fn class(&self, idx: usize) -> &SimClass {
        &self.classes[idx]
    }

    /// Allocate a string
    pub fn new_string(&mut self, text: &str) -> ObjId {
        self.alloc(HeapObject::Str(text.to_string()))
    }

    /// Allocate a string and return it as a value
    pub fn string_value(&mut self, text: &str) -> SimValue {
        SimValue::Ref(Some(self.new_string(text)))
    }

    /// Text of a string value
    pub fn string(&self, value: SimValue) -> Result<String, SimThrow> {
        let obj = value.as_ref().ok_or_else(SimThrow::null_pointer)?;
        match self.objects.get(&obj) {
            Some(HeapObject::Str(s)) => Ok(s.clone()),
            _ => Err(SimThrow::bare("java/lang/ClassCastException")),
        }
    }

    /// Allocate an instance of `class` with zeroed fields; no constructor runs
    pub fn new_instance(&mut self, class: &str) -> Result<ObjId, SimThrow> {
        let idx = self
            .class_idx(class)
            .ok_or_else(|| SimThrow::new("java/lang/NoClassDefFoundError", class))?;
        Ok(self.alloc_instance(idx))
    }

    pub(crate) fn alloc_instance(&mut self, idx: usize) -> ObjId {
        let mut fields = FxHashMap::default();
        let mut current = Some(idx);
        while let Some(c) = current {
            for field in self.classes[c].fields.iter().filter(|f| !f.is_static()) {
                fields
                    .entry(field.name.clone())
                    .or_insert_with(|| SimValue::default_for(&field.sig));
            }
            current = self.superclass_of(c);
        }
        let payload = match self.classes[idx].name.as_str() {
            "java/util/ArrayList" => Payload::List(Vec::new()),
            "java/lang/StringBuilder" => Payload::Text(String::new()),
            _ => Payload::None,
        };
        self.alloc(HeapObject::Instance {
            class: idx,
            fields,
            payload,
        })
    }

    /// Allocate a throwable with a message
    pub(crate) fn new_throwable(&mut self, throw: &SimThrow) -> ObjId {
        let idx = self
            .class_idx(&throw.class)
            .or_else(|| self.class_idx("java/lang/Throwable"))
            .unwrap_or(0);
        let obj = self.alloc_instance(idx);
        let message = match &throw.message {
            Some(m) => self.string_value(m),
            None => SimValue::NULL,
        };
        self.set_field(obj, "message", message);
        obj
    }

    /// Instance field value (zero if absent)
    pub fn field(&self, obj: ObjId, name: &str) -> SimValue {
        match self.objects.get(&obj) {
            Some(HeapObject::Instance { fields, .. }) => fields.get(name).copied().unwrap_or(SimValue::NULL),
            _ => SimValue::NULL,
        }
    }

    /// Set an instance field
    pub fn set_field(&mut self, obj: ObjId, name: &str, value: SimValue) {
        if let Some(HeapObject::Instance { fields, .. }) = self.objects.get_mut(&obj) {
            fields.insert(name.to_string(), value);
        }
    }

    pub(crate) fn static_value(&self, class: usize, name: &str) -> SimValue {
        self.statics
            .get(&(class, name.to_string()))
            .copied()
            .unwrap_or(SimValue::NULL)
    }

    pub(crate) fn set_static_value(&mut self, class: usize, name: &str, value: SimValue) {
        self.statics.insert((class, name.to_string()), value);
    }

    /// Element list of an `ArrayList`
    pub fn list_mut(&mut self, obj: Option<ObjId>) -> Result<&mut Vec<SimValue>, SimThrow> {
        let obj = obj.ok_or_else(SimThrow::null_pointer)?;
        match self.objects.get_mut(&obj) {
            Some(HeapObject::Instance {
                payload: Payload::List(items),
                ..
            }) => Ok(items),
            _ => Err(SimThrow::bare("java/lang/ClassCastException")),
        }
    }

    /// Buffer of a `StringBuilder`
    pub fn text_mut(&mut self, obj: Option<ObjId>) -> Result<&mut String, SimThrow> {
        let obj = obj.ok_or_else(SimThrow::null_pointer)?;
        match self.objects.get_mut(&obj) {
            Some(HeapObject::Instance {
                payload: Payload::Text(text),
                ..
            }) => Ok(text),
            _ => Err(SimThrow::bare("java/lang/ClassCastException")),
        }
    }

    /// Allocate an array
    pub fn new_array(&mut self, component: TypeSig, items: Vec<SimValue>) -> ObjId {
        self.alloc(HeapObject::Array { component, items })
    }

    /// Elements of an array
    pub fn array_items(&self, obj: ObjId) -> Option<&[SimValue]> {
        match self.objects.get(&obj) {
            Some(HeapObject::Array { items, .. }) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn array_mut(&mut self, obj: ObjId) -> Option<(&TypeSig, &mut Vec<SimValue>)> {
        match self.objects.get_mut(&obj) {
            Some(HeapObject::Array { component, items }) => Some((component, items)),
            _ => None,
        }
    }

    pub(crate) fn superclass_of(&self, idx: usize) -> Option<usize> {
        self.classes[idx]
            .superclass
            .as_deref()
            .and_then(|s| self.class_idx(s))
    }

    /// Runtime class of an object
    pub(crate) fn runtime_kind(&self, obj: ObjId) -> ClassKind {
        match self.objects.get(&obj) {
            Some(HeapObject::Instance { class, .. }) => ClassKind::Named(*class),
            Some(HeapObject::Str(_)) => ClassKind::Named(self.builtin("java/lang/String")),
            Some(HeapObject::Class(_)) => ClassKind::Named(self.builtin("java/lang/Class")),
            Some(HeapObject::Member { kind, .. }) => ClassKind::Named(self.builtin(match kind {
                MemberKind::Method => "java/lang/reflect/Method",
                MemberKind::Constructor => "java/lang/reflect/Constructor",
                MemberKind::Field => "java/lang/reflect/Field",
            })),
            Some(HeapObject::Array { component, .. }) => ClassKind::Array(component.clone()),
            None => ClassKind::Named(self.builtin(OBJECT)),
        }
    }

    /// Binary name of an object's runtime class
    pub fn class_name_of(&self, obj: ObjId) -> String {
        self.binary_name(&self.runtime_kind(obj))
    }

    pub(crate) fn binary_name(&self, kind: &ClassKind) -> String {
        match kind {
            ClassKind::Named(idx) => self.classes[*idx].name.replace('/', "."),
            ClassKind::Primitive(sig) => sig.to_string(),
            ClassKind::Array(component) => TypeSig::Array(Box::new(component.clone()))
                .descriptor()
                .replace('/', "."),
        }
    }

    pub(crate) fn kind_for_sig(&self, sig: &TypeSig) -> Option<ClassKind> {
        match sig {
            TypeSig::Object(name) => self.class_idx(name).map(ClassKind::Named),
            TypeSig::Array(component) => {
                if component.is_reference() {
                    self.kind_for_sig(component)?;
                }
                Some(ClassKind::Array((**component).clone()))
            }
            primitive => Some(ClassKind::Primitive(primitive.clone())),
        }
    }

    pub(crate) fn sig_for_kind(&self, kind: &ClassKind) -> TypeSig {
        match kind {
            ClassKind::Named(idx) => TypeSig::Object(self.classes[*idx].name.clone()),
            ClassKind::Primitive(sig) => sig.clone(),
            ClassKind::Array(component) => TypeSig::Array(Box::new(component.clone())),
        }
    }

    /// The unique `Class` object for a runtime class
    pub(crate) fn class_object(&mut self, kind: ClassKind) -> ObjId {
        if let Some(obj) = self.class_objects.get(&kind) {
            return *obj;
        }
        let obj = self.alloc(HeapObject::Class(kind.clone()));
        self.class_objects.insert(kind, obj);
        obj
    }

    pub(crate) fn class_kind_of(&self, obj: Option<ObjId>) -> Result<ClassKind, SimThrow> {
        let obj = obj.ok_or_else(SimThrow::null_pointer)?;
        match self.objects.get(&obj) {
            Some(HeapObject::Class(kind)) => Ok(kind.clone()),
            _ => Err(SimThrow::bare("java/lang/ClassCastException")),
        }
    }

    pub(crate) fn member_of(&self, obj: Option<ObjId>) -> Result<(MemberKind, usize, usize), SimThrow> {
        let obj = obj.ok_or_else(SimThrow::null_pointer)?;
        match self.objects.get(&obj) {
            Some(HeapObject::Member { kind, class, index }) => Ok((*kind, *class, *index)),
            _ => Err(SimThrow::bare("java/lang/ClassCastException")),
        }
    }

    pub(crate) fn is_assignable(&self, from: &ClassKind, to: &ClassKind) -> bool {
        if from == to {
            return true;
        }
        match (from, to) {
            (ClassKind::Primitive(_), _) | (_, ClassKind::Primitive(_)) => false,
            (_, ClassKind::Named(t)) if self.classes[*t].name == OBJECT => true,
            (ClassKind::Named(f), ClassKind::Named(t)) => {
                let class = &self.classes[*f];
                let parents = class.superclass.iter().chain(class.interfaces.iter());
                for parent in parents {
                    if let Some(p) = self.class_idx(parent) {
                        if self.is_assignable(&ClassKind::Named(p), &ClassKind::Named(*t)) {
                            return true;
                        }
                    }
                }
                false
            }
            (ClassKind::Array(f), ClassKind::Array(t)) => {
                if !f.is_reference() || !t.is_reference() {
                    return false;
                }
                match (self.kind_for_sig(f), self.kind_for_sig(t)) {
                    (Some(fk), Some(tk)) => self.is_assignable(&fk, &tk),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    pub(crate) fn is_instance(&self, obj: ObjId, target: &ClassKind) -> bool {
        self.is_assignable(&self.runtime_kind(obj), target)
    }

    /// Whether `obj` is an instance of the named class
    pub fn is_instance_of(&self, obj: ObjId, class: &str) -> bool {
        match self.class_idx(class) {
            Some(idx) => self.is_instance(obj, &ClassKind::Named(idx)),
            None => false,
        }
    }

    /// Method lookup by name and descriptor, walking superclasses
    pub(crate) fn find_method(&self, class: usize, name: &str, descriptor: &str, is_static: bool) -> Option<(usize, usize)> {
        let mut current = Some(class);
        while let Some(c) = current {
            let found = self.classes[c]
                .methods
                .iter()
                .position(|m| m.name == name && m.descriptor == descriptor && m.is_static() == is_static);
            if let Some(index) = found {
                return Some((c, index));
            }
            current = self.superclass_of(c);
        }
        None
    }

    pub(crate) fn find_constructor(&self, class: usize, descriptor: &str) -> Option<usize> {
        self.classes[class]
            .constructors
            .iter()
            .position(|c| c.descriptor == descriptor)
    }

    pub(crate) fn find_field(&self, class: usize, name: &str, descriptor: &str, is_static: bool) -> Option<(usize, usize)> {
        let mut current = Some(class);
        while let Some(c) = current {
            let found = self.classes[c]
                .fields
                .iter()
                .position(|f| f.name == name && f.sig.descriptor() == descriptor && f.is_static() == is_static);
            if let Some(index) = found {
                return Some((c, index));
            }
            current = self.superclass_of(c);
        }
        None
    }

    /// Public methods of a class and its superclasses, most derived first
    pub(crate) fn public_methods(&self, class: usize) -> Vec<(usize, usize)> {
        let mut seen: Vec<(String, String)> = Vec::new();
        let mut out = Vec::new();
        let mut current = Some(class);
        while let Some(c) = current {
            for (index, method) in self.classes[c].methods.iter().enumerate() {
                if !method.is_public() {
                    continue;
                }
                let key = (method.name.clone(), method.descriptor.clone());
                if !seen.contains(&key) {
                    seen.push(key);
                    out.push((c, index));
                }
            }
            current = self.superclass_of(c);
        }
        out
    }

    /// Public fields of a class and its superclasses
    pub(crate) fn public_fields(&self, class: usize) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut current = Some(class);
        while let Some(c) = current {
            for (index, field) in self.classes[c].fields.iter().enumerate() {
                if field.is_public() {
                    out.push((c, index));
                }
            }
            current = self.superclass_of(c);
        }
        out
    }

    pub(crate) fn new_member(&mut self, kind: MemberKind, class: usize, index: usize) -> ObjId {
        self.alloc(HeapObject::Member { kind, class, index })
    }

    /// `Class[]` of the given types; fails if a named type is not loaded
    pub(crate) fn class_array(&mut self, types: &[TypeSig]) -> SimResult {
        let mut items = Vec::with_capacity(types.len());
        for sig in types {
            let kind = self
                .kind_for_sig(sig)
                .ok_or_else(|| SimThrow::new("java/lang/NoClassDefFoundError", sig.to_string()))?;
            items.push(SimValue::Ref(Some(self.class_object(kind))));
        }
        let array = self.new_array(TypeSig::Object("java/lang/Class".to_string()), items);
        Ok(SimValue::Ref(Some(array)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::builtins;

    fn heap() -> SimHeap {
        SimHeap::new(builtins::classes().unwrap())
    }

    #[test]
    fn test_string_roundtrip() {
        let mut heap = heap();
        let value = heap.string_value("hello");
        assert_eq!(heap.string(value).unwrap(), "hello");
        assert_eq!(heap.string(SimValue::NULL), Err(SimThrow::null_pointer()));
    }

    #[test]
    fn test_assignability() {
        let heap = heap();
        let string = ClassKind::Named(heap.class_idx("java/lang/String").unwrap());
        let object = ClassKind::Named(heap.class_idx("java/lang/Object").unwrap());
        let seq = ClassKind::Named(heap.class_idx("java/lang/CharSequence").unwrap());
        assert!(heap.is_assignable(&string, &object));
        assert!(heap.is_assignable(&string, &seq));
        assert!(!heap.is_assignable(&object, &string));

        let strings = ClassKind::Array(TypeSig::string());
        let objects = ClassKind::Array(TypeSig::object());
        assert!(heap.is_assignable(&strings, &objects));
        assert!(heap.is_assignable(&strings, &object));
        assert!(!heap.is_assignable(&ClassKind::Array(TypeSig::Int), &objects));
    }

    #[test]
    fn test_class_objects_are_unique() {
        let mut heap = heap();
        let idx = heap.class_idx("java/lang/String").unwrap();
        let a = heap.class_object(ClassKind::Named(idx));
        let b = heap.class_object(ClassKind::Named(idx));
        assert_eq!(a, b);
        assert_eq!(heap.binary_name(&ClassKind::Array(TypeSig::string())), "[Ljava.lang.String;");
        assert_eq!(heap.binary_name(&ClassKind::Primitive(TypeSig::Int)), "int");
    }

    #[test]
    fn test_throwable_carries_message() {
        let mut heap = heap();
        let obj = heap.new_throwable(&SimThrow::new("java/lang/IllegalStateException", "boom"));
        assert_eq!(heap.class_name_of(obj), "java.lang.IllegalStateException");
        let message = heap.field(obj, "message");
        assert_eq!(heap.string(message).unwrap(), "boom");
        assert!(heap.is_instance_of(obj, "java/lang/RuntimeException"));
    }

    #[test]
    fn test_public_methods_prefer_most_derived() {
        let heap = heap();
        let string = heap.class_idx("java/lang/String").unwrap();
        let methods = heap.public_methods(string);
        let to_string: Vec<_> = methods
            .iter()
            .filter(|(c, i)| heap.classes[*c].methods[*i].name == "toString")
            .collect();
        assert_eq!(to_string.len(), 1);
        assert_eq!(to_string[0].0, string);
    }
}
