//! Overload selection
//!
//! Each candidate of matching arity is ranked by the summed cost of
//! converting every argument to its parameter type. The cheapest wins; a tie
//! between distinct signatures is reported instead of guessed.

use std::sync::Arc;

use crate::catalog::MethodDescriptor;
use crate::convert::{is_universal, HostValue, TypeConverter};
use crate::error::{BridgeError, Result};
use crate::signature::{ClassName, TypeSig};

/// Conversion cost of one argument, `None` if it cannot convert
fn cost(conv: &TypeConverter<'_, '_>, value: &HostValue, sig: &TypeSig) -> Result<Option<u32>> {
    let boxes = |names: &[&str]| names.iter().any(|n| sig.is_class(n));
    let cost = match (value, sig) {
        (HostValue::Null, s) => s.is_reference().then_some(1),

        (HostValue::Int(_), TypeSig::Int) => i32_fits(value).then_some(0),
        (HostValue::Int(_), TypeSig::Long) => Some(1),
        (HostValue::Int(i), TypeSig::Short) => i16::try_from(*i).is_ok().then_some(2),
        (HostValue::Int(i), TypeSig::Byte) => i8::try_from(*i).is_ok().then_some(2),
        (HostValue::Int(i), TypeSig::Char) => u16::try_from(*i).is_ok().then_some(2),
        (HostValue::Int(_), TypeSig::Float) => Some(3),
        (HostValue::Int(_), TypeSig::Double) => Some(4),
        (HostValue::Int(_), _) if boxes(&["java/lang/Integer"]) => i32_fits(value).then_some(5),
        (HostValue::Int(_), _) if boxes(&["java/lang/Long"]) => Some(5),
        (HostValue::Int(_), s) if boxes(&["java/lang/Number"]) || is_universal(s) => Some(6),

        (HostValue::Str(_), _) if boxes(&["java/lang/String"]) => Some(0),
        (HostValue::Str(_), s) if boxes(&["java/lang/CharSequence"]) || is_universal(s) => Some(1),
        (HostValue::Str(s), TypeSig::Char) => (s.encode_utf16().count() == 1).then_some(2),

        (HostValue::Float(_), TypeSig::Double) => Some(0),
        (HostValue::Float(x), TypeSig::Float) => (!x.is_finite() || (*x as f32).is_finite()).then_some(1),
        (HostValue::Float(_), _) if boxes(&["java/lang/Double"]) => Some(2),
        (HostValue::Float(_), s) if boxes(&["java/lang/Number"]) || is_universal(s) => Some(3),

        (HostValue::Bool(_), TypeSig::Boolean) => Some(0),
        (HostValue::Bool(_), _) if boxes(&["java/lang/Boolean"]) => Some(2),
        (HostValue::Bool(_), s) if is_universal(s) => Some(3),

        (HostValue::Object(proxy), s) if s.is_reference() => {
            let runtime = proxy.class_name()?;
            match s {
                TypeSig::Object(name) if ClassName::new(name)?.binary() == runtime => Some(0),
                s if s.is_class("java/lang/Object") => Some(2),
                s => {
                    // cross-VM objects are rejected later by the converter
                    match conv.to_foreign(value, s) {
                        Ok(_) => Some(1),
                        Err(BridgeError::Conversion(_)) => None,
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        (HostValue::List(items), TypeSig::Array(component)) => {
            let mut worst = 0;
            for item in items {
                match cost(conv, item, component)? {
                    Some(c) => worst = worst.max(c),
                    None => return Ok(None),
                }
            }
            Some(worst)
        }
        _ => None,
    };
    Ok(cost)
}

fn i32_fits(value: &HostValue) -> bool {
    matches!(value, HostValue::Int(i) if i32::try_from(*i).is_ok())
}

/// Pick the overload of `name` that best fits `args`
pub(crate) fn select(
    conv: &TypeConverter<'_, '_>,
    class: &ClassName,
    name: &str,
    candidates: &[Arc<MethodDescriptor>],
    args: &[HostValue],
) -> Result<Arc<MethodDescriptor>> {
    let arity: Vec<&Arc<MethodDescriptor>> = candidates
        .iter()
        .filter(|m| m.params().len() == args.len())
        .collect();
    if arity.is_empty() {
        return Err(BridgeError::MemberNotFound {
            class: class.binary(),
            member: format!("{}/{}", name, args.len()),
        });
    }

    let mut ranked: Vec<(u32, &Arc<MethodDescriptor>)> = Vec::new();
    'candidates: for method in arity {
        let mut total = 0;
        for (arg, param) in args.iter().zip(method.params()) {
            match cost(conv, arg, param)? {
                Some(c) => total += c,
                None => continue 'candidates,
            }
        }
        ranked.push((total, method));
    }

    // stable: among equal signatures declaration order decides
    ranked.sort_by_key(|(total, _)| *total);
    let Some(&(best, winner)) = ranked.first() else {
        let types: Vec<&str> = args.iter().map(HostValue::type_name).collect();
        return Err(BridgeError::Conversion(format!(
            "no overload of {}.{} accepts ({})",
            class.binary(),
            name,
            types.join(", ")
        )));
    };

    let tied: Vec<String> = ranked
        .iter()
        .take_while(|(total, _)| *total == best)
        .map(|(_, m)| m.descriptor().to_string())
        .collect();
    if tied.iter().any(|d| d != winner.descriptor()) {
        let mut candidates = tied;
        candidates.dedup();
        return Err(BridgeError::AmbiguousOverload {
            class: class.binary(),
            method: name.to_string(),
            candidates,
        });
    }
    log::trace!("{}.{} -> {}", class.binary(), name, winner.descriptor());
    Ok(Arc::clone(winner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Modifiers;
    use crate::config::Configuration;
    use crate::lifecycle::LifecycleManager;
    use crate::signature::MethodSig;
    use crate::sim::SimLauncher;

    fn method(descriptor: &str, set: usize) -> Arc<MethodDescriptor> {
        Arc::new(MethodDescriptor::new(
            "m".to_string(),
            MethodSig::parse(descriptor).unwrap(),
            Modifiers(Modifiers::PUBLIC | Modifiers::STATIC),
            set,
        ))
    }

    fn with_converter(test: impl FnOnce(&TypeConverter<'_, '_>, &ClassName)) {
        let manager = LifecycleManager::new(SimLauncher::builder().build().unwrap(), Configuration::default());
        let vm = manager.start(Configuration::default()).unwrap();
        let frame = vm.gateway().frame().unwrap();
        let conv = TypeConverter::new(&frame, &vm);
        test(&conv, &ClassName::new("demo.Overloads").unwrap());
    }

    #[test]
    fn test_int_prefers_int_over_text() {
        with_converter(|conv, class| {
            let candidates = [method("(Ljava/lang/String;)V", 0), method("(I)V", 0)];
            let chosen = select(conv, class, "m", &candidates, &[HostValue::Int(7)]).unwrap();
            assert_eq!(chosen.descriptor(), "(I)V");
            let chosen = select(conv, class, "m", &candidates, &[HostValue::from("7")]).unwrap();
            assert_eq!(chosen.descriptor(), "(Ljava/lang/String;)V");
        });
    }

    #[test]
    fn test_widening_ranks_below_exact() {
        with_converter(|conv, class| {
            let candidates = [method("(D)V", 0), method("(J)V", 0), method("(I)V", 0)];
            let chosen = select(conv, class, "m", &candidates, &[HostValue::Int(1)]).unwrap();
            assert_eq!(chosen.descriptor(), "(I)V");
            let chosen = select(conv, class, "m", &candidates, &[HostValue::Int(1 << 40)]).unwrap();
            assert_eq!(chosen.descriptor(), "(J)V");
        });
    }

    #[test]
    fn test_arity_and_conversion_failures() {
        with_converter(|conv, class| {
            let candidates = [method("(I)V", 0)];
            let err = select(conv, class, "m", &candidates, &[]).unwrap_err();
            assert!(matches!(err, BridgeError::MemberNotFound { ref member, .. } if member == "m/0"));
            let err = select(conv, class, "m", &candidates, &[HostValue::Bool(true)]).unwrap_err();
            assert!(matches!(err, BridgeError::Conversion(_)));
        });
    }

    #[test]
    fn test_null_is_ambiguous_between_references() {
        with_converter(|conv, class| {
            let candidates = [method("(Ljava/lang/String;)V", 0), method("(Ljava/lang/Integer;)V", 0)];
            match select(conv, class, "m", &candidates, &[HostValue::Null]).unwrap_err() {
                BridgeError::AmbiguousOverload { candidates, .. } => assert_eq!(candidates.len(), 2),
                other => panic!("unexpected {:?}", other),
            }
        });
    }

    #[test]
    fn test_duplicate_signature_takes_first_declared() {
        with_converter(|conv, class| {
            let first = method("(I)V", 0);
            let candidates = [Arc::clone(&first), method("(I)V", 0)];
            let chosen = select(conv, class, "m", &candidates, &[HostValue::Int(1)]).unwrap();
            assert!(Arc::ptr_eq(&chosen, &first));
        });
    }
}
