//! Core library classes of the simulated VM
//!
//! A small slice of `java.lang` and `java.util`, enough for the reflection
//! API, strings, boxing, exceptions and a couple of collection classes.

use super::builder::ClassBuilder;
use super::heap::{ClassKind, MemberKind, ObjId, SimHeap, SimResult, SimThrow, SimValue};
use crate::catalog::Modifiers;
use crate::error::Result;
use crate::signature::TypeSig;

const STRING_DESC: &str = "Ljava/lang/String;";

fn int_arg(args: &[SimValue], i: usize) -> i32 {
    args.get(i).and_then(SimValue::as_int).unwrap_or(0)
}

fn long_arg(args: &[SimValue], i: usize) -> i64 {
    args.get(i).and_then(SimValue::as_long).unwrap_or(0)
}

fn double_arg(args: &[SimValue], i: usize) -> f64 {
    args.get(i).and_then(SimValue::as_double).unwrap_or(0.0)
}

fn this_text(heap: &SimHeap, this: Option<ObjId>) -> std::result::Result<String, SimThrow> {
    heap.string(SimValue::Ref(this))
}

fn this_obj(this: Option<ObjId>) -> std::result::Result<ObjId, SimThrow> {
    this.ok_or_else(SimThrow::null_pointer)
}

/// `String.valueOf(Object)` rendering
pub(crate) fn display(heap: &SimHeap, value: SimValue) -> String {
    match value {
        SimValue::Void => String::new(),
        SimValue::Boolean(v) => v.to_string(),
        SimValue::Byte(v) => v.to_string(),
        SimValue::Char(v) => String::from_utf16_lossy(&[v]),
        SimValue::Short(v) => v.to_string(),
        SimValue::Int(v) => v.to_string(),
        SimValue::Long(v) => v.to_string(),
        SimValue::Float(v) => format!("{:?}", v),
        SimValue::Double(v) => format!("{:?}", v),
        SimValue::Ref(None) => "null".to_string(),
        SimValue::Ref(Some(obj)) => {
            if let Ok(s) = heap.string(value) {
                return s;
            }
            let class = heap.class_name_of(obj);
            match class.as_str() {
                "java.lang.Integer" | "java.lang.Long" | "java.lang.Double" | "java.lang.Boolean" => {
                    display(heap, heap.field(obj, "value"))
                }
                _ => format!("{}@{:x}", class, obj),
            }
        }
    }
}

fn boxed(heap: &mut SimHeap, class: &str, value: SimValue) -> SimResult {
    let obj = heap.new_instance(class)?;
    heap.set_field(obj, "value", value);
    Ok(SimValue::Ref(Some(obj)))
}

fn unboxed(heap: &SimHeap, this: Option<ObjId>) -> std::result::Result<SimValue, SimThrow> {
    Ok(heap.field(this_obj(this)?, "value"))
}

fn object() -> ClassBuilder {
    ClassBuilder::new("java/lang/Object")
        .default_constructor()
        .method("toString", "()Ljava/lang/String;", |heap, this, _| {
            let text = display(heap, SimValue::Ref(Some(this_obj(this)?)));
            Ok(heap.string_value(&text))
        })
        .method("hashCode", "()I", |_, this, _| Ok(SimValue::Int(this_obj(this)? as i32)))
        .method("equals", "(Ljava/lang/Object;)Z", |_, this, args| {
            Ok(SimValue::Boolean(this.is_some() && args[0].as_ref() == this))
        })
        .method("getClass", "()Ljava/lang/Class;", |heap, this, _| {
            let kind = heap.runtime_kind(this_obj(this)?);
            Ok(SimValue::Ref(Some(heap.class_object(kind))))
        })
}

fn string() -> ClassBuilder {
    ClassBuilder::new("java/lang/String")
        .modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
        .implements("java/lang/CharSequence")
        .method("length", "()I", |heap, this, _| {
            Ok(SimValue::Int(this_text(heap, this)?.encode_utf16().count() as i32))
        })
        .method("isEmpty", "()Z", |heap, this, _| {
            Ok(SimValue::Boolean(this_text(heap, this)?.is_empty()))
        })
        .method("toUpperCase", "()Ljava/lang/String;", |heap, this, _| {
            let upper = this_text(heap, this)?.to_uppercase();
            Ok(heap.string_value(&upper))
        })
        .method("concat", "(Ljava/lang/String;)Ljava/lang/String;", |heap, this, args| {
            let joined = this_text(heap, this)? + &heap.string(args[0])?;
            Ok(heap.string_value(&joined))
        })
        .method("charAt", "(I)C", |heap, this, args| {
            let units: Vec<u16> = this_text(heap, this)?.encode_utf16().collect();
            let index = int_arg(args, 0);
            usize::try_from(index)
                .ok()
                .and_then(|i| units.get(i))
                .map(|c| SimValue::Char(*c))
                .ok_or_else(|| {
                    SimThrow::new(
                        "java/lang/StringIndexOutOfBoundsException",
                        format!("index {}, length {}", index, units.len()),
                    )
                })
        })
        .method("substring", "(II)Ljava/lang/String;", |heap, this, args| {
            let units: Vec<u16> = this_text(heap, this)?.encode_utf16().collect();
            let (begin, end) = (int_arg(args, 0), int_arg(args, 1));
            if begin < 0 || end < begin || end as usize > units.len() {
                return Err(SimThrow::new(
                    "java/lang/StringIndexOutOfBoundsException",
                    format!("begin {}, end {}, length {}", begin, end, units.len()),
                ));
            }
            let text = String::from_utf16_lossy(&units[begin as usize..end as usize]);
            Ok(heap.string_value(&text))
        })
        .method("equals", "(Ljava/lang/Object;)Z", |heap, this, args| {
            let this = this_text(heap, this)?;
            Ok(SimValue::Boolean(heap.string(args[0]).map(|o| o == this).unwrap_or(false)))
        })
        .method("toString", "()Ljava/lang/String;", |_, this, _| Ok(SimValue::Ref(this)))
        .static_method("valueOf", "(I)Ljava/lang/String;", |heap, _, args| {
            Ok(heap.string_value(&int_arg(args, 0).to_string()))
        })
        .static_method("valueOf", "(J)Ljava/lang/String;", |heap, _, args| {
            Ok(heap.string_value(&long_arg(args, 0).to_string()))
        })
        .static_method("valueOf", "(Z)Ljava/lang/String;", |heap, _, args| {
            let text = display(heap, args[0]);
            Ok(heap.string_value(&text))
        })
        .static_method("valueOf", "(D)Ljava/lang/String;", |heap, _, args| {
            let text = display(heap, args[0]);
            Ok(heap.string_value(&text))
        })
        .static_method("valueOf", "(Ljava/lang/Object;)Ljava/lang/String;", |heap, _, args| {
            let text = display(heap, args[0]);
            Ok(heap.string_value(&text))
        })
}

fn member_array(heap: &mut SimHeap, kind: MemberKind, members: Vec<(usize, usize)>) -> SimValue {
    let component = match kind {
        MemberKind::Method => "java/lang/reflect/Method",
        MemberKind::Constructor => "java/lang/reflect/Constructor",
        MemberKind::Field => "java/lang/reflect/Field",
    };
    let items = members
        .into_iter()
        .map(|(class, index)| SimValue::Ref(Some(heap.new_member(kind, class, index))))
        .collect();
    SimValue::Ref(Some(heap.new_array(TypeSig::Object(component.to_string()), items)))
}

fn named(heap: &SimHeap, this: Option<ObjId>) -> std::result::Result<Option<usize>, SimThrow> {
    Ok(match heap.class_kind_of(this)? {
        ClassKind::Named(idx) => Some(idx),
        _ => None,
    })
}

fn class() -> ClassBuilder {
    ClassBuilder::new("java/lang/Class")
        .modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
        .method("getName", "()Ljava/lang/String;", |heap, this, _| {
            let name = heap.binary_name(&heap.class_kind_of(this)?);
            Ok(heap.string_value(&name))
        })
        .method("getSimpleName", "()Ljava/lang/String;", |heap, this, _| {
            let name = heap.binary_name(&heap.class_kind_of(this)?);
            let simple = name.rsplit(['.', '$']).next().unwrap_or(&name).to_string();
            Ok(heap.string_value(&simple))
        })
        .method("getModifiers", "()I", |heap, this, _| {
            let modifiers = match named(heap, this)? {
                Some(idx) => heap.class(idx).modifiers,
                None => Modifiers::PUBLIC | Modifiers::FINAL | Modifiers::ABSTRACT,
            };
            Ok(SimValue::Int(modifiers as i32))
        })
        .method("isInterface", "()Z", |heap, this, _| {
            let interface = named(heap, this)?
                .map(|idx| heap.class(idx).modifiers & Modifiers::INTERFACE != 0)
                .unwrap_or(false);
            Ok(SimValue::Boolean(interface))
        })
        .method("getSuperclass", "()Ljava/lang/Class;", |heap, this, _| {
            let parent = match heap.class_kind_of(this)? {
                ClassKind::Named(idx) if heap.class(idx).modifiers & Modifiers::INTERFACE == 0 => {
                    heap.superclass_of(idx).map(ClassKind::Named)
                }
                ClassKind::Array(_) => heap.class_idx("java/lang/Object").map(ClassKind::Named),
                _ => None,
            };
            Ok(SimValue::Ref(parent.map(|kind| heap.class_object(kind))))
        })
        .method("getDeclaredMethods", "()[Ljava/lang/reflect/Method;", |heap, this, _| {
            let members = match named(heap, this)? {
                Some(idx) => (0..heap.class(idx).methods.len()).map(|i| (idx, i)).collect(),
                None => Vec::new(),
            };
            Ok(member_array(heap, MemberKind::Method, members))
        })
        .method("getMethods", "()[Ljava/lang/reflect/Method;", |heap, this, _| {
            let members = named(heap, this)?
                .map(|idx| heap.public_methods(idx))
                .unwrap_or_default();
            Ok(member_array(heap, MemberKind::Method, members))
        })
        .method("getDeclaredFields", "()[Ljava/lang/reflect/Field;", |heap, this, _| {
            let members = match named(heap, this)? {
                Some(idx) => (0..heap.class(idx).fields.len()).map(|i| (idx, i)).collect(),
                None => Vec::new(),
            };
            Ok(member_array(heap, MemberKind::Field, members))
        })
        .method("getFields", "()[Ljava/lang/reflect/Field;", |heap, this, _| {
            let members = named(heap, this)?
                .map(|idx| heap.public_fields(idx))
                .unwrap_or_default();
            Ok(member_array(heap, MemberKind::Field, members))
        })
        .method("getConstructors", "()[Ljava/lang/reflect/Constructor;", |heap, this, _| {
            let members = match named(heap, this)? {
                Some(idx) => heap
                    .class(idx)
                    .constructors
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.is_public())
                    .map(|(i, _)| (idx, i))
                    .collect(),
                None => Vec::new(),
            };
            Ok(member_array(heap, MemberKind::Constructor, members))
        })
}

fn reflect_method() -> ClassBuilder {
    ClassBuilder::new("java/lang/reflect/Method")
        .modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
        .method("getName", "()Ljava/lang/String;", |heap, this, _| {
            let (_, class, index) = heap.member_of(this)?;
            let name = heap.class(class).methods[index].name.clone();
            Ok(heap.string_value(&name))
        })
        .method("getParameterTypes", "()[Ljava/lang/Class;", |heap, this, _| {
            let (_, class, index) = heap.member_of(this)?;
            let params = heap.class(class).methods[index].sig.params.clone();
            heap.class_array(&params)
        })
        .method("getReturnType", "()Ljava/lang/Class;", |heap, this, _| {
            let (_, class, index) = heap.member_of(this)?;
            let ret = heap.class(class).methods[index].sig.ret.clone();
            let kind = heap
                .kind_for_sig(&ret)
                .ok_or_else(|| SimThrow::new("java/lang/NoClassDefFoundError", ret.to_string()))?;
            Ok(SimValue::Ref(Some(heap.class_object(kind))))
        })
        .method("getModifiers", "()I", |heap, this, _| {
            let (_, class, index) = heap.member_of(this)?;
            Ok(SimValue::Int(heap.class(class).methods[index].modifiers as i32))
        })
        .method("getDeclaringClass", "()Ljava/lang/Class;", |heap, this, _| {
            let (_, class, _) = heap.member_of(this)?;
            Ok(SimValue::Ref(Some(heap.class_object(ClassKind::Named(class)))))
        })
}

fn reflect_constructor() -> ClassBuilder {
    ClassBuilder::new("java/lang/reflect/Constructor")
        .modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
        .method("getName", "()Ljava/lang/String;", |heap, this, _| {
            let (_, class, _) = heap.member_of(this)?;
            let name = heap.binary_name(&ClassKind::Named(class));
            Ok(heap.string_value(&name))
        })
        .method("getParameterTypes", "()[Ljava/lang/Class;", |heap, this, _| {
            let (_, class, index) = heap.member_of(this)?;
            let params = heap.class(class).constructors[index].sig.params.clone();
            heap.class_array(&params)
        })
        .method("getModifiers", "()I", |heap, this, _| {
            let (_, class, index) = heap.member_of(this)?;
            Ok(SimValue::Int(heap.class(class).constructors[index].modifiers as i32))
        })
}

fn reflect_field() -> ClassBuilder {
    ClassBuilder::new("java/lang/reflect/Field")
        .modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
        .method("getName", "()Ljava/lang/String;", |heap, this, _| {
            let (_, class, index) = heap.member_of(this)?;
            let name = heap.class(class).fields[index].name.clone();
            Ok(heap.string_value(&name))
        })
        .method("getType", "()Ljava/lang/Class;", |heap, this, _| {
            let (_, class, index) = heap.member_of(this)?;
            let sig = heap.class(class).fields[index].sig.clone();
            let kind = heap
                .kind_for_sig(&sig)
                .ok_or_else(|| SimThrow::new("java/lang/NoClassDefFoundError", sig.to_string()))?;
            Ok(SimValue::Ref(Some(heap.class_object(kind))))
        })
        .method("getModifiers", "()I", |heap, this, _| {
            let (_, class, index) = heap.member_of(this)?;
            Ok(SimValue::Int(heap.class(class).fields[index].modifiers as i32))
        })
}

fn throwable(name: &str, superclass: &str) -> ClassBuilder {
    ClassBuilder::new(name)
        .extends(superclass)
        .constructor("()V", |_, _, _| Ok(SimValue::Void))
        .constructor("(Ljava/lang/String;)V", |heap, this, args| {
            heap.set_field(this_obj(this)?, "message", args[0]);
            Ok(SimValue::Void)
        })
}

const THROWABLES: &[(&str, &str)] = &[
    ("java/lang/Exception", "java/lang/Throwable"),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/NumberFormatException", "java/lang/IllegalArgumentException"),
    ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/ArrayStoreException", "java/lang/RuntimeException"),
    ("java/lang/NegativeArraySizeException", "java/lang/RuntimeException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    ("java/lang/StringIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
    ("java/lang/ArrayIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
    ("java/lang/ReflectiveOperationException", "java/lang/Exception"),
    ("java/lang/ClassNotFoundException", "java/lang/ReflectiveOperationException"),
    ("java/lang/InstantiationException", "java/lang/ReflectiveOperationException"),
    ("java/lang/Error", "java/lang/Throwable"),
    ("java/lang/LinkageError", "java/lang/Error"),
    ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
    ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
    ("java/lang/NoSuchMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/AbstractMethodError", "java/lang/IncompatibleClassChangeError"),
];

fn throwable_root() -> ClassBuilder {
    throwable("java/lang/Throwable", "java/lang/Object")
        .field_with("message", STRING_DESC, Modifiers::PRIVATE)
        .method("getMessage", "()Ljava/lang/String;", |heap, this, _| {
            Ok(heap.field(this_obj(this)?, "message"))
        })
        .method("toString", "()Ljava/lang/String;", |heap, this, _| {
            let obj = this_obj(this)?;
            let class = heap.class_name_of(obj);
            let text = match heap.string(heap.field(obj, "message")) {
                Ok(message) => format!("{}: {}", class, message),
                Err(_) => class,
            };
            Ok(heap.string_value(&text))
        })
}

fn number() -> ClassBuilder {
    ClassBuilder::new("java/lang/Number")
        .modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT)
        .default_constructor()
        .abstract_method("intValue", "()I")
        .abstract_method("longValue", "()J")
        .abstract_method("doubleValue", "()D")
}

fn numeric_box(name: &str, descriptor: &str) -> ClassBuilder {
    let class = name.to_string();
    let value_of = format!("({})L{};", descriptor, name);
    ClassBuilder::new(name)
        .extends("java/lang/Number")
        .modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
        .field_with("value", descriptor, Modifiers::PRIVATE | Modifiers::FINAL)
        .static_method("valueOf", &value_of, move |heap, _, args| boxed(heap, &class, args[0]))
        .method("intValue", "()I", |heap, this, _| {
            Ok(match unboxed(heap, this)? {
                SimValue::Double(d) => SimValue::Int(d as i32),
                other => SimValue::Int(other.as_long().unwrap_or(0) as i32),
            })
        })
        .method("longValue", "()J", |heap, this, _| {
            Ok(match unboxed(heap, this)? {
                SimValue::Double(d) => SimValue::Long(d as i64),
                other => SimValue::Long(other.as_long().unwrap_or(0)),
            })
        })
        .method("doubleValue", "()D", |heap, this, _| {
            Ok(SimValue::Double(unboxed(heap, this)?.as_double().unwrap_or(0.0)))
        })
        .method("toString", "()Ljava/lang/String;", |heap, this, _| {
            let text = display(heap, unboxed(heap, this)?);
            Ok(heap.string_value(&text))
        })
        .method("equals", "(Ljava/lang/Object;)Z", |heap, this, args| {
            let same_class = match (this, args[0].as_ref()) {
                (Some(a), Some(b)) => heap.class_name_of(a) == heap.class_name_of(b),
                _ => false,
            };
            let equal = same_class
                && args[0]
                    .as_ref()
                    .map(|other| heap.field(other, "value"))
                    == Some(unboxed(heap, this)?);
            Ok(SimValue::Boolean(equal))
        })
}

fn integer() -> ClassBuilder {
    numeric_box("java/lang/Integer", "I")
        .static_field("MAX_VALUE", "I", SimValue::Int(i32::MAX))
        .static_field("MIN_VALUE", "I", SimValue::Int(i32::MIN))
        .static_method("parseInt", "(Ljava/lang/String;)I", |heap, _, args| {
            let text = heap.string(args[0])?;
            text.trim()
                .parse::<i32>()
                .map(SimValue::Int)
                .map_err(|_| {
                    SimThrow::new(
                        "java/lang/NumberFormatException",
                        format!("For input string: \"{}\"", text),
                    )
                })
        })
}

fn boolean() -> ClassBuilder {
    ClassBuilder::new("java/lang/Boolean")
        .modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
        .field_with("value", "Z", Modifiers::PRIVATE | Modifiers::FINAL)
        .static_method("valueOf", "(Z)Ljava/lang/Boolean;", |heap, _, args| {
            boxed(heap, "java/lang/Boolean", args[0])
        })
        .method("booleanValue", "()Z", |heap, this, _| unboxed(heap, this))
        .method("toString", "()Ljava/lang/String;", |heap, this, _| {
            let text = display(heap, unboxed(heap, this)?);
            Ok(heap.string_value(&text))
        })
}

fn math() -> ClassBuilder {
    ClassBuilder::new("java/lang/Math")
        .modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
        .constructor_with("()V", Modifiers::PRIVATE, |_, _, _| Ok(SimValue::Void))
        .static_field("PI", "D", SimValue::Double(std::f64::consts::PI))
        .static_method("abs", "(I)I", |_, _, args| Ok(SimValue::Int(int_arg(args, 0).wrapping_abs())))
        .static_method("abs", "(J)J", |_, _, args| Ok(SimValue::Long(long_arg(args, 0).wrapping_abs())))
        .static_method("abs", "(F)F", |_, _, args| Ok(SimValue::Float((double_arg(args, 0) as f32).abs())))
        .static_method("abs", "(D)D", |_, _, args| Ok(SimValue::Double(double_arg(args, 0).abs())))
        .static_method("max", "(II)I", |_, _, args| {
            Ok(SimValue::Int(int_arg(args, 0).max(int_arg(args, 1))))
        })
        .static_method("max", "(JJ)J", |_, _, args| {
            Ok(SimValue::Long(long_arg(args, 0).max(long_arg(args, 1))))
        })
        .static_method("max", "(DD)D", |_, _, args| {
            Ok(SimValue::Double(double_arg(args, 0).max(double_arg(args, 1))))
        })
        .static_method("sqrt", "(D)D", |_, _, args| Ok(SimValue::Double(double_arg(args, 0).sqrt())))
        .static_method("floorDiv", "(II)I", |_, _, args| {
            let (x, y) = (int_arg(args, 0), int_arg(args, 1));
            if y == 0 {
                return Err(SimThrow::new("java/lang/ArithmeticException", "/ by zero"));
            }
            let q = x.wrapping_div(y);
            let floor = if x.wrapping_rem(y) != 0 && (x ^ y) < 0 { q - 1 } else { q };
            Ok(SimValue::Int(floor))
        })
}

fn array_list() -> ClassBuilder {
    ClassBuilder::new("java/util/ArrayList")
        .implements("java/util/List")
        .default_constructor()
        .method("add", "(Ljava/lang/Object;)Z", |heap, this, args| {
            heap.list_mut(this)?.push(args[0]);
            Ok(SimValue::Boolean(true))
        })
        .method("get", "(I)Ljava/lang/Object;", |heap, this, args| {
            let index = int_arg(args, 0);
            let items = heap.list_mut(this)?;
            let len = items.len();
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i).copied())
                .ok_or_else(|| {
                    SimThrow::new(
                        "java/lang/IndexOutOfBoundsException",
                        format!("Index {} out of bounds for length {}", index, len),
                    )
                })
        })
        .method("size", "()I", |heap, this, _| Ok(SimValue::Int(heap.list_mut(this)?.len() as i32)))
        .method("isEmpty", "()Z", |heap, this, _| {
            Ok(SimValue::Boolean(heap.list_mut(this)?.is_empty()))
        })
        .method("clear", "()V", |heap, this, _| {
            heap.list_mut(this)?.clear();
            Ok(SimValue::Void)
        })
}

fn string_builder() -> ClassBuilder {
    const SELF: &str = "Ljava/lang/StringBuilder;";
    let append = |heap: &mut SimHeap, this: Option<ObjId>, args: &[SimValue]| -> SimResult {
        let text = display(heap, args[0]);
        heap.text_mut(this)?.push_str(&text);
        Ok(SimValue::Ref(this))
    };
    ClassBuilder::new("java/lang/StringBuilder")
        .modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
        .implements("java/lang/CharSequence")
        .default_constructor()
        .constructor("(Ljava/lang/String;)V", |heap, this, args| {
            let initial = heap.string(args[0])?;
            heap.text_mut(this)?.push_str(&initial);
            Ok(SimValue::Void)
        })
        .method("append", &format!("(Ljava/lang/String;){}", SELF), append)
        .method("append", &format!("(I){}", SELF), append)
        .method("append", &format!("(Z){}", SELF), append)
        .method("append", &format!("(Ljava/lang/Object;){}", SELF), append)
        .method("length", "()I", |heap, this, _| {
            Ok(SimValue::Int(heap.text_mut(this)?.encode_utf16().count() as i32))
        })
        .method("toString", "()Ljava/lang/String;", |heap, this, _| {
            let text = heap.text_mut(this)?.clone();
            Ok(heap.string_value(&text))
        })
}

/// The builtin class table. `java/lang/Object` is always first.
pub(crate) fn classes() -> Result<Vec<super::heap::SimClass>> {
    let mut builders = vec![
        object(),
        ClassBuilder::interface("java/lang/CharSequence"),
        string(),
        class(),
        reflect_method(),
        reflect_constructor(),
        reflect_field(),
        throwable_root(),
    ];
    builders.extend(THROWABLES.iter().map(|(name, sup)| throwable(name, sup)));
    builders.extend([
        number(),
        integer(),
        numeric_box("java/lang/Long", "J"),
        numeric_box("java/lang/Double", "D"),
        boolean(),
        math(),
        ClassBuilder::interface("java/util/List"),
        array_list(),
        string_builder(),
    ]);
    builders.into_iter().map(ClassBuilder::finish).collect()
}
