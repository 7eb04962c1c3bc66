//! Foreign type signatures
//!
//! Two spellings of the same type show up at the bridge:
//! - JNI descriptors: `I`, `Ljava/lang/String;`, `[I`, `(Ljava/lang/String;)I`
//! - Reflective names from `Class.getName()`: `int`, `java.lang.String`,
//!   `[I`, `[Ljava.lang.String;`
//!
//! [`TypeSig`] is the parsed form of either.

use std::fmt;

use crate::error::{BridgeError, Result};

/// Call and field kinds of the native interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// `V`
    Void,
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// Any reference type
    Object,
}

impl ReturnKind {
    /// Offset of this kind in the JNI `Call<Type>MethodA` ordering
    /// (Object, Boolean, Byte, Char, Short, Int, Long, Float, Double, Void)
    pub fn call_slot(self) -> usize {
        match self {
            ReturnKind::Object => 0,
            ReturnKind::Boolean => 1,
            ReturnKind::Byte => 2,
            ReturnKind::Char => 3,
            ReturnKind::Short => 4,
            ReturnKind::Int => 5,
            ReturnKind::Long => 6,
            ReturnKind::Float => 7,
            ReturnKind::Double => 8,
            ReturnKind::Void => 9,
        }
    }
}

/// A parsed foreign type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `void` (return position only)
    Void,
    /// Reference type, internal form (`java/lang/String`)
    Object(String),
    /// Array of the component type
    Array(Box<TypeSig>),
}

impl TypeSig {
    /// `Ljava/lang/String;`
    pub fn string() -> Self {
        TypeSig::Object("java/lang/String".to_string())
    }

    /// `Ljava/lang/Object;`
    pub fn object() -> Self {
        TypeSig::Object("java/lang/Object".to_string())
    }

    /// Parse a single field descriptor (`I`, `Ljava/lang/String;`, `[[D`).
    pub fn parse_descriptor(descriptor: &str) -> Result<Self> {
        let (sig, rest) = Self::parse_prefix(descriptor)?;
        if !rest.is_empty() {
            return Err(BridgeError::Conversion(format!(
                "trailing characters in descriptor '{}'",
                descriptor
            )));
        }
        Ok(sig)
    }

    fn parse_prefix(input: &str) -> Result<(Self, &str)> {
        let bad = || BridgeError::Conversion(format!("malformed descriptor '{}'", input));
        let mut chars = input.chars();
        let head = chars.next().ok_or_else(bad)?;
        let rest = chars.as_str();
        let sig = match head {
            'Z' => TypeSig::Boolean,
            'B' => TypeSig::Byte,
            'C' => TypeSig::Char,
            'S' => TypeSig::Short,
            'I' => TypeSig::Int,
            'J' => TypeSig::Long,
            'F' => TypeSig::Float,
            'D' => TypeSig::Double,
            'V' => TypeSig::Void,
            'L' => {
                let end = rest.find(';').ok_or_else(bad)?;
                if end == 0 {
                    return Err(bad());
                }
                return Ok((TypeSig::Object(rest[..end].to_string()), &rest[end + 1..]));
            }
            '[' => {
                let (component, rest) = Self::parse_prefix(rest)?;
                if component == TypeSig::Void {
                    return Err(bad());
                }
                return Ok((TypeSig::Array(Box::new(component)), rest));
            }
            _ => return Err(bad()),
        };
        Ok((sig, rest))
    }

    /// Parse a reflective type name as returned by `Class.getName()`.
    ///
    /// Primitive names map to primitives, array names are descriptors with
    /// dots, anything else is a binary class name.
    pub fn from_java_name(name: &str) -> Result<Self> {
        let sig = match name {
            "boolean" => TypeSig::Boolean,
            "byte" => TypeSig::Byte,
            "char" => TypeSig::Char,
            "short" => TypeSig::Short,
            "int" => TypeSig::Int,
            "long" => TypeSig::Long,
            "float" => TypeSig::Float,
            "double" => TypeSig::Double,
            "void" => TypeSig::Void,
            "" => {
                return Err(BridgeError::Conversion("empty type name".to_string()));
            }
            array if array.starts_with('[') => {
                return TypeSig::parse_descriptor(&array.replace('.', "/"));
            }
            class => TypeSig::Object(class.replace('.', "/")),
        };
        Ok(sig)
    }

    /// JNI descriptor of this type
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            TypeSig::Boolean => out.push('Z'),
            TypeSig::Byte => out.push('B'),
            TypeSig::Char => out.push('C'),
            TypeSig::Short => out.push('S'),
            TypeSig::Int => out.push('I'),
            TypeSig::Long => out.push('J'),
            TypeSig::Float => out.push('F'),
            TypeSig::Double => out.push('D'),
            TypeSig::Void => out.push('V'),
            TypeSig::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            TypeSig::Array(component) => {
                out.push('[');
                component.write_descriptor(out);
            }
        }
    }

    /// Call kind used to invoke a method returning this type
    pub fn return_kind(&self) -> ReturnKind {
        match self {
            TypeSig::Boolean => ReturnKind::Boolean,
            TypeSig::Byte => ReturnKind::Byte,
            TypeSig::Char => ReturnKind::Char,
            TypeSig::Short => ReturnKind::Short,
            TypeSig::Int => ReturnKind::Int,
            TypeSig::Long => ReturnKind::Long,
            TypeSig::Float => ReturnKind::Float,
            TypeSig::Double => ReturnKind::Double,
            TypeSig::Void => ReturnKind::Void,
            TypeSig::Object(_) | TypeSig::Array(_) => ReturnKind::Object,
        }
    }

    /// Whether values of this type are references
    pub fn is_reference(&self) -> bool {
        matches!(self, TypeSig::Object(_) | TypeSig::Array(_))
    }

    /// Internal class name for `FindClass`: `java/lang/String` for objects,
    /// the descriptor for arrays, `None` for primitives.
    pub fn class_name(&self) -> Option<String> {
        match self {
            TypeSig::Object(name) => Some(name.clone()),
            TypeSig::Array(_) => Some(self.descriptor()),
            _ => None,
        }
    }

    /// Whether this is the reference type with the given internal name
    pub fn is_class(&self, internal: &str) -> bool {
        matches!(self, TypeSig::Object(name) if name == internal)
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Boolean => write!(f, "boolean"),
            TypeSig::Byte => write!(f, "byte"),
            TypeSig::Char => write!(f, "char"),
            TypeSig::Short => write!(f, "short"),
            TypeSig::Int => write!(f, "int"),
            TypeSig::Long => write!(f, "long"),
            TypeSig::Float => write!(f, "float"),
            TypeSig::Double => write!(f, "double"),
            TypeSig::Void => write!(f, "void"),
            TypeSig::Object(name) => write!(f, "{}", name.replace('/', ".")),
            TypeSig::Array(component) => write!(f, "{}[]", component),
        }
    }
}

/// A parsed method descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// Parameter types in order
    pub params: Vec<TypeSig>,
    /// Return type
    pub ret: TypeSig,
}

impl MethodSig {
    /// Build from parts
    pub fn new(params: Vec<TypeSig>, ret: TypeSig) -> Self {
        Self { params, ret }
    }

    /// Parse `(Ljava/lang/String;I)V`
    pub fn parse(descriptor: &str) -> Result<Self> {
        let bad = || BridgeError::Conversion(format!("malformed method descriptor '{}'", descriptor));
        let body = descriptor.strip_prefix('(').ok_or_else(bad)?;
        let close = body.find(')').ok_or_else(bad)?;
        let mut params_str = &body[..close];
        let mut params = Vec::new();
        while !params_str.is_empty() {
            let (param, rest) = TypeSig::parse_prefix(params_str)?;
            if param == TypeSig::Void {
                return Err(bad());
            }
            params.push(param);
            params_str = rest;
        }
        let ret = TypeSig::parse_descriptor(&body[close + 1..])?;
        Ok(Self { params, ret })
    }

    /// `(params)ret` descriptor
    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for param in &self.params {
            param.write_descriptor(&mut out);
        }
        out.push(')');
        self.ret.write_descriptor(&mut out);
        out
    }

    /// `(params)` part only, the overload identity of a method
    pub fn param_descriptor(&self) -> String {
        let mut out = String::from("(");
        for param in &self.params {
            param.write_descriptor(&mut out);
        }
        out.push(')');
        out
    }
}

/// A class name in both binary (`java.lang.String`) and internal
/// (`java/lang/String`) spelling
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassName {
    internal: String,
}

impl ClassName {
    /// Accepts either spelling
    pub fn new(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed.starts_with(['.', '/'])
            || trimmed.ends_with(['.', '/'])
            || trimmed.contains("..")
            || trimmed.contains("//")
        {
            return Err(BridgeError::ClassNotFound(name.to_string()));
        }
        Ok(Self {
            internal: trimmed.replace('.', "/"),
        })
    }

    /// `java/lang/String`
    pub fn internal(&self) -> &str {
        &self.internal
    }

    /// `java.lang.String`
    pub fn binary(&self) -> String {
        self.internal.replace('/', ".")
    }

    /// `String`
    pub fn simple(&self) -> &str {
        self.internal
            .rsplit('/')
            .next()
            .unwrap_or(&self.internal)
    }

    /// `java.lang`, empty for the default package
    pub fn package(&self) -> String {
        match self.internal.rfind('/') {
            Some(idx) => self.internal[..idx].replace('/', "."),
            None => String::new(),
        }
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary())
    }
}
