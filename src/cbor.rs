use ciborium::value::Value;

pub(crate) type CborMap = Vec<(Value, Value)>;

/// Decode a single CBOR item that must span the whole input.
pub(crate) fn decode(data: &[u8]) -> Result<Value, String> {
    let (value, consumed) = decode_prefix(data)?;
    if consumed != data.len() {
        return Err(format!("{} trailing bytes after CBOR item", data.len() - consumed));
    }
    Ok(value)
}

/// Decode the first CBOR item in `data`, returning it with the number of bytes it occupied.
pub(crate) fn decode_prefix(data: &[u8]) -> Result<(Value, usize), String> {
    let mut rest = data;
    let value: Value = ciborium::from_reader(&mut rest).map_err(|e| e.to_string())?;
    Ok((value, data.len() - rest.len()))
}

pub(crate) fn decode_map(data: &[u8]) -> Result<CborMap, String> {
    match decode(data)? {
        Value::Map(map) => Ok(map),
        _ => Err("expected map".into()),
    }
}

pub(crate) fn encode(value: &Value) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| e.to_string())?;
    Ok(buf)
}

pub(crate) fn cbor_get<'a>(map: &'a [(Value, Value)], key: i64) -> Option<&'a Value> {
    let target = Value::Integer(key.into());
    map.iter().find(|(k, _)| k == &target).map(|(_, v)| v)
}

pub(crate) fn cbor_get_str<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Text(s) if s == key))
        .map(|(_, v)| v)
}

pub(crate) fn cbor_bytes(v: &Value) -> Option<&[u8]> {
    match v { Value::Bytes(b) => Some(b), _ => None }
}

pub(crate) fn cbor_text(v: &Value) -> Option<&str> {
    match v { Value::Text(s) => Some(s), _ => None }
}

pub(crate) fn cbor_int(v: &Value) -> Option<i64> {
    match v { Value::Integer(i) => i64::try_from(i128::from(*i)).ok(), _ => None }
}

pub(crate) fn cbor_map(v: &Value) -> Option<&[(Value, Value)]> {
    match v { Value::Map(m) => Some(m), _ => None }
}

pub(crate) fn cbor_array(v: &Value) -> Option<&[Value]> {
    match v { Value::Array(a) => Some(a), _ => None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(b: &[u8]) -> Value { Value::Bytes(b.to_vec()) }
    fn tv(s: &str)  -> Value { Value::Text(s.to_string()) }
    fn iv(i: i64)   -> Value { Value::Integer(i.into()) }

    #[test]
    fn test_decode_prefix_reports_consumed_length() {
        let mut data = encode(&Value::Map(vec![(iv(1), iv(2))])).unwrap();
        let item_len = data.len();
        data.extend_from_slice(&[0xAA, 0xBB]);
        let (value, consumed) = decode_prefix(&data).unwrap();
        assert_eq!(consumed, item_len);
        assert!(matches!(value, Value::Map(_)));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut data = encode(&iv(7)).unwrap();
        data.push(0x00);
        assert!(decode(&data).is_err());
    }

    #[test]
    fn test_decode_map_rejects_non_map() {
        let data = encode(&Value::Array(vec![iv(1)])).unwrap();
        assert_eq!(decode_map(&data).unwrap_err(), "expected map");
    }

    #[test]
    fn test_accessors() {
        let map = vec![
            (iv(3), iv(-7)),
            (tv("sig"), bv(&[1, 2, 3])),
            (tv("fmt"), tv("packed")),
        ];
        assert_eq!(cbor_get(&map, 3).and_then(cbor_int), Some(-7));
        assert_eq!(cbor_get_str(&map, "sig").and_then(cbor_bytes), Some(&[1u8, 2, 3][..]));
        assert_eq!(cbor_get_str(&map, "fmt").and_then(cbor_text), Some("packed"));
        assert!(cbor_get_str(&map, "x5c").is_none());
        assert!(cbor_get(&map, 1).is_none());
    }
}
