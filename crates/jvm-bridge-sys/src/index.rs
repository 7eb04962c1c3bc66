//! Function-table slot indices
//!
//! Slot numbers follow the published JNI function table layout, which is
//! stable across VM versions (new functions are only ever appended).

/// `JNIEnv` function table slots
pub mod env {
    #![allow(missing_docs)]

    pub const GET_VERSION: usize = 4;
    pub const FIND_CLASS: usize = 6;
    pub const GET_SUPERCLASS: usize = 10;
    pub const IS_ASSIGNABLE_FROM: usize = 11;
    pub const EXCEPTION_OCCURRED: usize = 15;
    pub const EXCEPTION_DESCRIBE: usize = 16;
    pub const EXCEPTION_CLEAR: usize = 17;
    pub const PUSH_LOCAL_FRAME: usize = 19;
    pub const POP_LOCAL_FRAME: usize = 20;
    pub const NEW_GLOBAL_REF: usize = 21;
    pub const DELETE_GLOBAL_REF: usize = 22;
    pub const DELETE_LOCAL_REF: usize = 23;
    pub const IS_SAME_OBJECT: usize = 24;
    pub const NEW_LOCAL_REF: usize = 25;
    pub const NEW_OBJECT_A: usize = 30;
    pub const GET_OBJECT_CLASS: usize = 31;
    pub const IS_INSTANCE_OF: usize = 32;
    pub const GET_METHOD_ID: usize = 33;

    // Call<Type>MethodA, ordered Object, Boolean, Byte, Char, Short, Int,
    // Long, Float, Double, Void; each entry is 3 slots apart.
    pub const CALL_OBJECT_METHOD_A: usize = 36;
    pub const CALL_METHOD_A_STRIDE: usize = 3;

    pub const GET_FIELD_ID: usize = 94;
    // Get<Type>Field / Set<Type>Field, ordered Object..Double, contiguous.
    pub const GET_OBJECT_FIELD: usize = 95;
    pub const SET_OBJECT_FIELD: usize = 104;

    pub const GET_STATIC_METHOD_ID: usize = 113;
    pub const CALL_STATIC_OBJECT_METHOD_A: usize = 116;

    pub const GET_STATIC_FIELD_ID: usize = 144;
    pub const GET_STATIC_OBJECT_FIELD: usize = 145;
    pub const SET_STATIC_OBJECT_FIELD: usize = 154;

    pub const NEW_STRING: usize = 163;
    pub const GET_STRING_LENGTH: usize = 164;

    pub const GET_ARRAY_LENGTH: usize = 171;
    pub const NEW_OBJECT_ARRAY: usize = 172;
    pub const GET_OBJECT_ARRAY_ELEMENT: usize = 173;
    pub const SET_OBJECT_ARRAY_ELEMENT: usize = 174;
    // New<Type>Array, Get<Type>ArrayRegion, Set<Type>ArrayRegion, ordered
    // Boolean, Byte, Char, Short, Int, Long, Float, Double.
    pub const NEW_BOOLEAN_ARRAY: usize = 175;
    pub const GET_BOOLEAN_ARRAY_REGION: usize = 199;
    pub const SET_BOOLEAN_ARRAY_REGION: usize = 207;

    pub const GET_STRING_REGION: usize = 220;
    pub const NEW_WEAK_GLOBAL_REF: usize = 226;
    pub const DELETE_WEAK_GLOBAL_REF: usize = 227;
    pub const EXCEPTION_CHECK: usize = 228;
}

/// `JavaVM` invocation interface slots
pub mod invoke {
    #![allow(missing_docs)]

    pub const DESTROY_JAVA_VM: usize = 3;
    pub const ATTACH_CURRENT_THREAD: usize = 4;
    pub const DETACH_CURRENT_THREAD: usize = 5;
    pub const GET_ENV: usize = 6;
    pub const ATTACH_CURRENT_THREAD_AS_DAEMON: usize = 7;
}

#[cfg(test)]
mod tests {
    use super::env;

    #[test]
    fn test_call_method_slots_line_up() {
        // CallVoidMethodA is the 10th kind after CallObjectMethodA
        assert_eq!(env::CALL_OBJECT_METHOD_A + 9 * env::CALL_METHOD_A_STRIDE, 63);
        // CallStaticVoidMethodA
        assert_eq!(
            env::CALL_STATIC_OBJECT_METHOD_A + 9 * env::CALL_METHOD_A_STRIDE,
            143
        );
        // SetDoubleField / GetStaticDoubleField
        assert_eq!(env::SET_OBJECT_FIELD + 8, 112);
        assert_eq!(env::GET_STATIC_OBJECT_FIELD + 8, 153);
    }
}
