/// A minimal, valid class file declaring `internal_name` with
/// `java/lang/Object` as its superclass.
pub fn class_bytes(internal_name: &str) -> Vec<u8> {
    class_bytes_with_super(internal_name, Some("java/lang/Object"))
}

pub fn class_bytes_with_super(internal_name: &str, super_internal: Option<&str>) -> Vec<u8> {
    fn push_u16(out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_be_bytes());
    }
    fn push_utf8(out: &mut Vec<u8>, s: &str) {
        out.push(1); // CONSTANT_Utf8
        push_u16(out, s.len() as u16);
        out.extend_from_slice(s.as_bytes());
    }
    fn push_class(out: &mut Vec<u8>, name_index: u16) {
        out.push(7); // CONSTANT_Class
        push_u16(out, name_index);
    }

    const MAJOR_JAVA_8: u16 = 52;

    // Constant pool:
    // 1: Utf8 this
    // 2: Class #1
    // 3: Utf8 super (optional)
    // 4: Class #3 (optional)
    let cp_count: u16 = if super_internal.is_some() { 5 } else { 3 };

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    push_u16(&mut bytes, 0); // minor
    push_u16(&mut bytes, MAJOR_JAVA_8);
    push_u16(&mut bytes, cp_count);

    push_utf8(&mut bytes, internal_name);
    push_class(&mut bytes, 1);
    if let Some(super_internal) = super_internal {
        push_utf8(&mut bytes, super_internal);
        push_class(&mut bytes, 3);
    }

    // access_flags (public + super)
    push_u16(&mut bytes, 0x0021);
    // this_class
    push_u16(&mut bytes, 2);
    // super_class
    push_u16(&mut bytes, if super_internal.is_some() { 4 } else { 0 });
    // interfaces_count, fields_count, methods_count, attributes_count
    push_u16(&mut bytes, 0);
    push_u16(&mut bytes, 0);
    push_u16(&mut bytes, 0);
    push_u16(&mut bytes, 0);
    bytes
}
