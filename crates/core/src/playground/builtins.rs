//! Global objects and prototype methods available to snippets.

use std::fmt::Write as _;
use std::rc::Rc;

use super::heap::{HeapObject, Native, NativeFn, ObjectKind, Slot};
use super::interpreter::{Completion, MAX_COLLECTION_LENGTH, Machine};
use super::value::{ObjId, Value, array_index, number_to_string};

//
// ─── INSTALLATION ─────────────────────────────────────────────────────────────
//

pub(crate) fn install(machine: &mut Machine) {
    install_object(machine);
    install_function(machine);
    install_array(machine);
    install_string(machine);
    install_number(machine);
    install_boolean(machine);
    install_errors(machine);
    install_globals(machine);
}

fn native(machine: &mut Machine, name: &'static str, func: NativeFn, constructor: bool) -> ObjId {
    let id = machine.heap.alloc(HeapObject::new(
        ObjectKind::Native(Native {
            name,
            func,
            constructor,
        }),
        Some(machine.intrinsics.function_proto),
    ));
    machine.heap.get_mut(id).define("name", Value::from(name));
    id
}

fn method(machine: &mut Machine, target: ObjId, name: &'static str, func: NativeFn) {
    let function = native(machine, name, func, false);
    machine.heap.get_mut(target).define(name, Value::Object(function));
}

fn namespace(machine: &mut Machine, name: &str, methods: &[(&'static str, NativeFn)]) -> ObjId {
    let id = machine.new_object_id();
    for (method_name, func) in methods {
        method(machine, id, method_name, *func);
    }
    machine.define_builtin(name, Value::Object(id));
    id
}

/// Links a global constructor with its prototype object.
fn constructor(machine: &mut Machine, name: &'static str, func: NativeFn, proto: ObjId) -> ObjId {
    let id = native(machine, name, func, true);
    machine.heap.get_mut(id).define("prototype", Value::Object(proto));
    machine.heap.get_mut(proto).define("constructor", Value::Object(id));
    machine.define_builtin(name, Value::Object(id));
    id
}

fn install_object(machine: &mut Machine) {
    let proto = machine.intrinsics.object_proto;
    method(machine, proto, "toString", object_to_string);
    method(machine, proto, "valueOf", identity);
    method(machine, proto, "hasOwnProperty", has_own_property);
    let object = constructor(machine, "Object", object_ctor, proto);
    for (name, func) in [
        ("keys", object_keys as NativeFn),
        ("values", object_values),
        ("entries", object_entries),
        ("assign", object_assign),
    ] {
        method(machine, object, name, func);
    }
}

fn install_function(machine: &mut Machine) {
    let proto = machine.intrinsics.function_proto;
    method(machine, proto, "toString", function_to_string);
}

fn install_array(machine: &mut Machine) {
    let proto = machine.intrinsics.array_proto;
    for (name, func) in [
        ("push", array_push as NativeFn),
        ("pop", array_pop),
        ("shift", array_shift),
        ("unshift", array_unshift),
        ("join", array_join),
        ("toString", array_join),
        ("includes", array_includes),
        ("indexOf", array_index_of),
        ("map", array_map),
        ("filter", array_filter),
        ("forEach", array_for_each),
        ("reduce", array_reduce),
        ("find", array_find),
        ("findIndex", array_find_index),
        ("some", array_some),
        ("every", array_every),
        ("slice", array_slice),
        ("concat", array_concat),
        ("reverse", array_reverse),
        ("sort", array_sort),
    ] {
        method(machine, proto, name, func);
    }
    let array = constructor(machine, "Array", array_ctor, proto);
    method(machine, array, "isArray", array_is_array);
    method(machine, array, "from", array_from);
}

fn install_string(machine: &mut Machine) {
    let proto = machine.intrinsics.string_proto;
    for (name, func) in [
        ("toUpperCase", string_to_upper_case as NativeFn),
        ("toLowerCase", string_to_lower_case),
        ("trim", string_trim),
        ("trimStart", string_trim_start),
        ("trimEnd", string_trim_end),
        ("includes", string_includes),
        ("startsWith", string_starts_with),
        ("endsWith", string_ends_with),
        ("indexOf", string_index_of),
        ("slice", string_slice),
        ("substring", string_substring),
        ("split", string_split),
        ("repeat", string_repeat),
        ("charAt", string_char_at),
        ("padStart", string_pad_start),
        ("padEnd", string_pad_end),
        ("replace", string_replace),
        ("replaceAll", string_replace_all),
        ("toString", string_value_of),
        ("valueOf", string_value_of),
    ] {
        method(machine, proto, name, func);
    }
    constructor(machine, "String", string_ctor, proto);
}

fn install_number(machine: &mut Machine) {
    let proto = machine.intrinsics.number_proto;
    method(machine, proto, "toFixed", number_to_fixed);
    method(machine, proto, "toString", number_to_string_method);
    method(machine, proto, "valueOf", identity);
    let number = constructor(machine, "Number", number_ctor, proto);
    method(machine, number, "isInteger", number_is_integer);
    method(machine, number, "isFinite", number_is_finite);
    let heap_number = machine.heap.get_mut(number);
    heap_number.define("MAX_SAFE_INTEGER", Value::Number(9_007_199_254_740_991.0));
    heap_number.define("MIN_SAFE_INTEGER", Value::Number(-9_007_199_254_740_991.0));
}

fn install_boolean(machine: &mut Machine) {
    let proto = machine.intrinsics.boolean_proto;
    method(machine, proto, "toString", boolean_to_string);
    method(machine, proto, "valueOf", identity);
    constructor(machine, "Boolean", boolean_ctor, proto);
}

fn install_errors(machine: &mut Machine) {
    let intrinsics = machine.intrinsics;
    let error_proto = intrinsics.error_proto;
    method(machine, error_proto, "toString", error_to_string);
    machine.heap.get_mut(error_proto).define("message", Value::from(""));
    let error = constructor(machine, "Error", error_ctor, error_proto);
    for (name, func, proto) in [
        ("Error", error_ctor as NativeFn, error_proto),
        ("TypeError", type_error_ctor, intrinsics.type_error_proto),
        ("RangeError", range_error_ctor, intrinsics.range_error_proto),
        ("ReferenceError", reference_error_ctor, intrinsics.reference_error_proto),
        ("SyntaxError", syntax_error_ctor, intrinsics.syntax_error_proto),
    ] {
        machine.heap.get_mut(proto).define("name", Value::from(name));
        if proto != error_proto {
            let id = constructor(machine, name, func, proto);
            machine.heap.get_mut(id).proto = Some(error);
        }
    }
}

fn install_globals(machine: &mut Machine) {
    namespace(machine, "console", &[("log", console_log as NativeFn)]);
    let math = namespace(
        machine,
        "Math",
        &[
            ("floor", math_floor as NativeFn),
            ("ceil", math_ceil),
            ("round", math_round),
            ("abs", math_abs),
            ("max", math_max),
            ("min", math_min),
            ("sqrt", math_sqrt),
            ("pow", math_pow),
            ("trunc", math_trunc),
            ("sign", math_sign),
        ],
    );
    machine
        .heap
        .get_mut(math)
        .define("PI", Value::Number(std::f64::consts::PI));
    machine
        .heap
        .get_mut(math)
        .define("E", Value::Number(std::f64::consts::E));
    namespace(machine, "JSON", &[("stringify", json_stringify as NativeFn)]);
    for (name, func) in [
        ("parseInt", parse_int as NativeFn),
        ("parseFloat", parse_float),
        ("isNaN", is_nan),
        ("isFinite", is_finite),
    ] {
        let id = native(machine, name, func, false);
        machine.define_builtin(name, Value::Object(id));
    }
    machine.define_builtin("NaN", Value::Number(f64::NAN));
    machine.define_builtin("Infinity", Value::Number(f64::INFINITY));
}

//
// ─── HELPERS ──────────────────────────────────────────────────────────────────
//

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn number_arg(machine: &mut Machine, args: &[Value], index: usize) -> Completion<f64> {
    machine.to_number(&arg(args, index))
}

/// `ToIntegerOrInfinity`.
fn integer_arg(machine: &mut Machine, args: &[Value], index: usize) -> Completion<f64> {
    let n = number_arg(machine, args, index)?;
    Ok(if n.is_nan() { 0.0 } else { n.trunc() })
}

/// Resolves a possibly negative position against `len`, clamped to `0..=len`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn relative_index(position: f64, len: usize) -> usize {
    let len_f = len as f64;
    if position < 0.0 {
        (len_f + position).max(0.0) as usize
    } else {
        position.min(len_f) as usize
    }
}

#[allow(clippy::cast_precision_loss)]
fn length_value(len: usize) -> Value {
    Value::Number(len as f64)
}

fn index_value(index: Option<usize>) -> Value {
    index.map_or(Value::Number(-1.0), length_value)
}

fn charge_len(machine: &mut Machine, len: usize) -> Completion<()> {
    machine.charge(u64::try_from(len).unwrap_or(u64::MAX) / 16)
}

fn this_array(machine: &mut Machine, this: &Value, name: &str) -> Completion<ObjId> {
    match this.as_object() {
        Some(id) if matches!(machine.heap.get(id).kind, ObjectKind::Array(_)) => Ok(id),
        _ => Err(machine.type_error(format!("Array.prototype.{name} called on a non-array"))),
    }
}

fn items(machine: &Machine, id: ObjId) -> Vec<Value> {
    match &machine.heap.get(id).kind {
        ObjectKind::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn items_mut(machine: &mut Machine, id: ObjId) -> Option<&mut Vec<Value>> {
    match &mut machine.heap.get_mut(id).kind {
        ObjectKind::Array(items) => Some(items),
        _ => None,
    }
}

fn array_len(machine: &Machine, id: ObjId) -> usize {
    match &machine.heap.get(id).kind {
        ObjectKind::Array(items) => items.len(),
        _ => 0,
    }
}

fn element(machine: &Machine, id: ObjId, index: usize) -> Option<Value> {
    match &machine.heap.get(id).kind {
        ObjectKind::Array(items) => items.get(index).cloned(),
        _ => None,
    }
}

fn callback(machine: &mut Machine, args: &[Value]) -> Completion<Value> {
    let function = arg(args, 0);
    if machine.is_callable(&function) {
        Ok(function)
    } else {
        let text = machine.to_string(&function)?;
        Err(machine.type_error(format!("{text} is not a function")))
    }
}

fn this_string(machine: &mut Machine, this: &Value) -> Completion<Rc<str>> {
    match this {
        Value::Str(text) => Ok(Rc::clone(text)),
        Value::Undefined | Value::Null => Err(machine.type_error(
            "String.prototype method called on null or undefined",
        )),
        other => machine.to_string(other),
    }
}

fn string_arg(machine: &mut Machine, args: &[Value], index: usize) -> Completion<Rc<str>> {
    let value = arg(args, index);
    machine.to_string(&value)
}

fn check_string_len(machine: &mut Machine, len: usize) -> Completion<()> {
    if len > MAX_COLLECTION_LENGTH {
        Err(machine.range_error("Invalid string length"))
    } else {
        Ok(())
    }
}

/// Character offset of the byte position `byte` in `text`.
fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Byte position of the character offset `chars` in `text`.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(byte, _)| byte)
}

fn char_slice(text: &str, start: usize, end: usize) -> String {
    if start >= end {
        return String::new();
    }
    text.chars().skip(start).take(end - start).collect()
}

//
// ─── OBJECT ───────────────────────────────────────────────────────────────────
//

fn identity(_: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    Ok(this)
}

fn object_to_string(_: &mut Machine, _: Value, _: Vec<Value>) -> Completion<Value> {
    Ok(Value::from("[object Object]"))
}

fn has_own_property(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let key = machine.property_key(&arg(&args, 0))?;
    Ok(Value::Bool(match &this {
        Value::Object(id) => {
            let object = machine.heap.get(*id);
            let in_array = match &object.kind {
                ObjectKind::Array(items) => {
                    &*key == "length" || array_index(&key).is_some_and(|i| i < items.len())
                }
                _ => false,
            };
            in_array || object.own(&key).is_some()
        }
        Value::Str(text) => {
            &*key == "length" || array_index(&key).is_some_and(|i| i < text.chars().count())
        }
        _ => false,
    }))
}

fn object_ctor(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    match arg(&args, 0) {
        value @ Value::Object(_) => Ok(value),
        _ => Ok(Value::Object(machine.new_object_id())),
    }
}

fn object_keys(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let keys = machine.enumerable_keys(&arg(&args, 0))?;
    machine.new_array(keys.into_iter().map(Value::Str).collect())
}

fn object_values(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let target = arg(&args, 0);
    let mut values = Vec::new();
    for key in machine.enumerable_keys(&target)? {
        values.push(machine.get_property(&target, &key)?);
    }
    machine.new_array(values)
}

fn object_entries(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let target = arg(&args, 0);
    let mut entries = Vec::new();
    for key in machine.enumerable_keys(&target)? {
        let value = machine.get_property(&target, &key)?;
        entries.push(machine.new_array(vec![Value::Str(key), value])?);
    }
    machine.new_array(entries)
}

fn object_assign(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let target = arg(&args, 0);
    if target.is_nullish() {
        return Err(machine.type_error("Cannot convert undefined or null to object"));
    }
    for source in args.iter().skip(1) {
        for key in machine.enumerable_keys(source)? {
            let value = machine.get_property(source, &key)?;
            machine.set_property(&target, &key, value)?;
        }
    }
    Ok(target)
}

fn function_to_string(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    let Some(id) = this.as_object().filter(|_| machine.is_callable(&this)) else {
        return Err(machine.type_error("Function.prototype.toString requires that 'this' be a Function"));
    };
    let text = match &machine.heap.get(id).kind {
        ObjectKind::Native(native) => format!("function {}() {{ [native code] }}", native.name),
        ObjectKind::Class(data) => {
            format!("class {} {{ }}", data.def.name.as_deref().unwrap_or_default())
        }
        ObjectKind::Closure(closure) => format!(
            "function {}() {{ }}",
            closure.def.name.as_deref().unwrap_or_default()
        ),
        ObjectKind::Plain | ObjectKind::Array(_) => String::new(),
    };
    Ok(Value::from(text))
}

//
// ─── ARRAY ────────────────────────────────────────────────────────────────────
//

fn array_ctor(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    if let [Value::Number(n)] = args.as_slice() {
        let n = *n;
        if n < 0.0 || n.fract() != 0.0 || n > MAX_COLLECTION_LENGTH as f64 {
            return Err(machine.range_error("Invalid array length"));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let len = n as usize;
        charge_len(machine, len)?;
        return machine.new_array(vec![Value::Undefined; len]);
    }
    machine.new_array(args)
}

fn array_is_array(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    Ok(Value::Bool(machine.is_array(&arg(&args, 0))))
}

fn array_from(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let source = arg(&args, 0);
    let mut values = match &source {
        Value::Str(text) => text.chars().map(|c| Value::from(c.to_string())).collect(),
        Value::Object(id) if machine.is_array(&source) => items(machine, *id),
        Value::Object(_) => {
            let len = machine.get_property(&source, "length")?;
            let len = machine.to_number(&len)?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let len = if len.is_nan() || len < 0.0 { 0 } else { len as usize };
            if len > MAX_COLLECTION_LENGTH {
                return Err(machine.range_error("Invalid array length"));
            }
            charge_len(machine, len)?;
            let mut values = Vec::with_capacity(len);
            for index in 0..len {
                values.push(machine.get_property(&source, &index.to_string())?);
            }
            values
        }
        _ => Vec::new(),
    };
    let mapper = arg(&args, 1);
    if !mapper.is_nullish() {
        if !machine.is_callable(&mapper) {
            let text = machine.to_string(&mapper)?;
            return Err(machine.type_error(format!("{text} is not a function")));
        }
        for (index, value) in values.iter_mut().enumerate() {
            let mapped = machine.call(&mapper, Value::Undefined, vec![value.clone(), length_value(index)])?;
            *value = mapped;
        }
    }
    machine.new_array(values)
}

fn array_push(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "push")?;
    if array_len(machine, id) + args.len() > MAX_COLLECTION_LENGTH {
        return Err(machine.range_error("Invalid array length"));
    }
    let len = items_mut(machine, id).map_or(0, |items| {
        items.extend(args);
        items.len()
    });
    Ok(length_value(len))
}

fn array_pop(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "pop")?;
    Ok(items_mut(machine, id).and_then(Vec::pop).unwrap_or_default())
}

fn array_shift(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "shift")?;
    let len = array_len(machine, id);
    charge_len(machine, len)?;
    Ok(items_mut(machine, id)
        .filter(|items| !items.is_empty())
        .map(|items| items.remove(0))
        .unwrap_or_default())
}

fn array_unshift(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "unshift")?;
    let len = array_len(machine, id);
    if len + args.len() > MAX_COLLECTION_LENGTH {
        return Err(machine.range_error("Invalid array length"));
    }
    charge_len(machine, len)?;
    let len = items_mut(machine, id).map_or(0, |items| {
        items.splice(0..0, args);
        items.len()
    });
    Ok(length_value(len))
}

fn array_join(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "join")?;
    if machine.visiting.contains(&id) {
        return Ok(Value::from(""));
    }
    let separator: Rc<str> = match arg(&args, 0) {
        Value::Undefined => ",".into(),
        other => machine.to_string(&other)?,
    };
    let values = items(machine, id);
    charge_len(machine, values.len())?;
    machine.visiting.push(id);
    let joined = join_values(machine, &values, &separator);
    machine.visiting.pop();
    Ok(Value::from(joined?))
}

fn join_values(machine: &mut Machine, values: &[Value], separator: &str) -> Completion<String> {
    let mut joined = String::new();
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            joined.push_str(separator);
        }
        if !value.is_nullish() {
            joined.push_str(&machine.to_string(value)?);
        }
        check_string_len(machine, joined.len())?;
    }
    Ok(joined)
}

/// SameValueZero, as `includes` compares.
fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

fn search_start(machine: &mut Machine, args: &[Value], len: usize) -> Completion<usize> {
    let from = integer_arg(machine, args, 1)?;
    Ok(relative_index(from, len))
}

fn array_includes(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "includes")?;
    let values = items(machine, id);
    charge_len(machine, values.len())?;
    let start = search_start(machine, &args, values.len())?;
    let needle = arg(&args, 0);
    Ok(Value::Bool(
        values[start..].iter().any(|value| same_value_zero(value, &needle)),
    ))
}

fn array_index_of(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "indexOf")?;
    let values = items(machine, id);
    charge_len(machine, values.len())?;
    let start = search_start(machine, &args, values.len())?;
    let needle = arg(&args, 0);
    Ok(index_value(
        values[start..]
            .iter()
            .position(|value| value.strict_equals(&needle))
            .map(|offset| start + offset),
    ))
}

/// Calls `f(element, index, array)` for each index present when iteration began.
fn visit<F>(machine: &mut Machine, this: &Value, name: &str, args: &[Value], mut on_result: F) -> Completion<()>
where
    F: FnMut(&mut Machine, usize, Value, Value) -> Completion<bool>,
{
    let id = this_array(machine, this, name)?;
    let function = callback(machine, args)?;
    let this_arg = arg(args, 1);
    let len = array_len(machine, id);
    for index in 0..len {
        let Some(item) = element(machine, id, index) else {
            break;
        };
        let result = machine.call(
            &function,
            this_arg.clone(),
            vec![item.clone(), length_value(index), this.clone()],
        )?;
        if !on_result(machine, index, item, result)? {
            break;
        }
    }
    Ok(())
}

fn array_map(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let mut mapped = Vec::new();
    visit(machine, &this, "map", &args, |_, _, _, result| {
        mapped.push(result);
        Ok(true)
    })?;
    machine.new_array(mapped)
}

fn array_filter(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let mut kept = Vec::new();
    visit(machine, &this, "filter", &args, |_, _, item, result| {
        if result.truthy() {
            kept.push(item);
        }
        Ok(true)
    })?;
    machine.new_array(kept)
}

fn array_for_each(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    visit(machine, &this, "forEach", &args, |_, _, _, _| Ok(true))?;
    Ok(Value::Undefined)
}

fn array_find(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let mut found = Value::Undefined;
    visit(machine, &this, "find", &args, |_, _, item, result| {
        if result.truthy() {
            found = item;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}

fn array_find_index(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let mut found = None;
    visit(machine, &this, "findIndex", &args, |_, index, _, result| {
        if result.truthy() {
            found = Some(index);
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(index_value(found))
}

fn array_some(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let mut any = false;
    visit(machine, &this, "some", &args, |_, _, _, result| {
        any = result.truthy();
        Ok(!any)
    })?;
    Ok(Value::Bool(any))
}

fn array_every(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let mut all = true;
    visit(machine, &this, "every", &args, |_, _, _, result| {
        all = result.truthy();
        Ok(all)
    })?;
    Ok(Value::Bool(all))
}

fn array_reduce(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "reduce")?;
    let function = callback(machine, &args)?;
    let len = array_len(machine, id);
    let mut index = 0;
    let mut accumulator = if args.len() >= 2 {
        arg(&args, 1)
    } else {
        match element(machine, id, 0) {
            Some(first) => {
                index = 1;
                first
            }
            None => {
                return Err(machine.type_error("Reduce of empty array with no initial value"));
            }
        }
    };
    while index < len {
        let Some(item) = element(machine, id, index) else {
            break;
        };
        accumulator = machine.call(
            &function,
            Value::Undefined,
            vec![accumulator, item, length_value(index), this.clone()],
        )?;
        index += 1;
    }
    Ok(accumulator)
}

fn array_slice(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "slice")?;
    let values = items(machine, id);
    let len = values.len();
    let start = relative_index(integer_arg(machine, &args, 0)?, len);
    let end = match arg(&args, 1) {
        Value::Undefined => len,
        _ => relative_index(integer_arg(machine, &args, 1)?, len),
    };
    let slice = if start < end { values[start..end].to_vec() } else { Vec::new() };
    charge_len(machine, slice.len())?;
    machine.new_array(slice)
}

fn array_concat(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "concat")?;
    let mut values = items(machine, id);
    for extra in args {
        match extra.as_object() {
            Some(other) if machine.is_array(&extra) => values.extend(items(machine, other)),
            _ => values.push(extra),
        }
        if values.len() > MAX_COLLECTION_LENGTH {
            return Err(machine.range_error("Invalid array length"));
        }
    }
    charge_len(machine, values.len())?;
    machine.new_array(values)
}

fn array_reverse(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "reverse")?;
    if let Some(items) = items_mut(machine, id) {
        items.reverse();
    }
    Ok(this)
}

/// Default order: `undefined` last, everything else by string value.
fn sort_before(machine: &mut Machine, comparator: &Value, a: &Value, b: &Value) -> Completion<bool> {
    match (a, b) {
        (Value::Undefined, _) => return Ok(false),
        (_, Value::Undefined) => return Ok(true),
        _ => {}
    }
    if comparator.is_nullish() {
        let a = machine.to_string(a)?;
        let b = machine.to_string(b)?;
        return Ok(a < b);
    }
    let order = machine.call(comparator, Value::Undefined, vec![a.clone(), b.clone()])?;
    Ok(machine.to_number(&order)? < 0.0)
}

fn array_sort(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let id = this_array(machine, &this, "sort")?;
    let comparator = arg(&args, 0);
    if !comparator.is_nullish() && !machine.is_callable(&comparator) {
        return Err(machine.type_error(
            "The comparison function must be either a function or undefined",
        ));
    }
    // Stable insertion sort; the comparator may call back into the machine.
    let mut values = items(machine, id);
    for current in 1..values.len() {
        let mut position = current;
        while position > 0 {
            machine.charge(1)?;
            if sort_before(machine, &comparator, &values[position], &values[position - 1])? {
                values.swap(position, position - 1);
                position -= 1;
            } else {
                break;
            }
        }
    }
    if let Some(items) = items_mut(machine, id) {
        *items = values;
    }
    Ok(this)
}

//
// ─── STRING ───────────────────────────────────────────────────────────────────
//

fn string_ctor(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    if args.is_empty() {
        return Ok(Value::from(""));
    }
    Ok(Value::Str(string_arg(machine, &args, 0)?))
}

fn string_value_of(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    Ok(Value::Str(this_string(machine, &this)?))
}

fn string_to_upper_case(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    Ok(Value::from(this_string(machine, &this)?.to_uppercase()))
}

fn string_to_lower_case(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    Ok(Value::from(this_string(machine, &this)?.to_lowercase()))
}

fn string_trim(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    Ok(Value::from(this_string(machine, &this)?.trim()))
}

fn string_trim_start(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    Ok(Value::from(this_string(machine, &this)?.trim_start()))
}

fn string_trim_end(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    Ok(Value::from(this_string(machine, &this)?.trim_end()))
}

fn string_includes(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let text = this_string(machine, &this)?;
    let needle = string_arg(machine, &args, 0)?;
    let start = byte_offset(&text, search_start(machine, &args, text.chars().count())?);
    Ok(Value::Bool(text[start..].contains(&*needle)))
}

fn string_starts_with(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let text = this_string(machine, &this)?;
    let needle = string_arg(machine, &args, 0)?;
    let start = byte_offset(&text, search_start(machine, &args, text.chars().count())?);
    Ok(Value::Bool(text[start..].starts_with(&*needle)))
}

fn string_ends_with(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let text = this_string(machine, &this)?;
    let needle = string_arg(machine, &args, 0)?;
    let len = text.chars().count();
    let end = match arg(&args, 1) {
        Value::Undefined => len,
        _ => relative_index(integer_arg(machine, &args, 1)?.max(0.0), len),
    };
    Ok(Value::Bool(text[..byte_offset(&text, end)].ends_with(&*needle)))
}

fn string_index_of(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let text = this_string(machine, &this)?;
    let needle = string_arg(machine, &args, 0)?;
    let start = search_start(machine, &args, text.chars().count())?;
    let from = byte_offset(&text, start);
    Ok(index_value(
        text[from..]
            .find(&*needle)
            .map(|byte| char_offset(&text, from + byte)),
    ))
}

fn string_slice(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let text = this_string(machine, &this)?;
    let len = text.chars().count();
    let start = relative_index(integer_arg(machine, &args, 0)?, len);
    let end = match arg(&args, 1) {
        Value::Undefined => len,
        _ => relative_index(integer_arg(machine, &args, 1)?, len),
    };
    Ok(Value::from(char_slice(&text, start, end)))
}

fn string_substring(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let text = this_string(machine, &this)?;
    let len = text.chars().count();
    let start = relative_index(integer_arg(machine, &args, 0)?.max(0.0), len);
    let end = match arg(&args, 1) {
        Value::Undefined => len,
        _ => relative_index(integer_arg(machine, &args, 1)?.max(0.0), len),
    };
    Ok(Value::from(char_slice(&text, start.min(end), start.max(end))))
}

fn string_split(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let text = this_string(machine, &this)?;
    let limit = match arg(&args, 1) {
        Value::Undefined => usize::MAX,
        _ => {
            let limit = integer_arg(machine, &args, 1)?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let limit = limit.max(0.0) as usize;
            limit
        }
    };
    let parts: Vec<Value> = match arg(&args, 0) {
        Value::Undefined => vec![Value::Str(text)],
        separator => {
            let separator = machine.to_string(&separator)?;
            charge_len(machine, text.len())?;
            if separator.is_empty() {
                text.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                text.split(&*separator).map(Value::from).collect()
            }
        }
    };
    machine.new_array(parts.into_iter().take(limit).collect())
}

fn string_repeat(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let text = this_string(machine, &this)?;
    let count = integer_arg(machine, &args, 0)?;
    if count < 0.0 || count.is_infinite() {
        return Err(machine.range_error(format!(
            "Invalid count value: {}",
            number_to_string(count)
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = count as usize;
    check_string_len(machine, text.len().saturating_mul(count))?;
    charge_len(machine, text.len() * count)?;
    Ok(Value::from(text.repeat(count)))
}

fn string_char_at(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let text = this_string(machine, &this)?;
    let index = integer_arg(machine, &args, 0)?;
    if index < 0.0 {
        return Ok(Value::from(""));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = index as usize;
    Ok(Value::from(
        text.chars().nth(index).map(String::from).unwrap_or_default(),
    ))
}

fn pad(machine: &mut Machine, this: &Value, args: &[Value], at_start: bool) -> Completion<Value> {
    let text = this_string(machine, this)?;
    let target = integer_arg(machine, args, 0)?;
    let filler: Rc<str> = match arg(args, 1) {
        Value::Undefined => " ".into(),
        other => machine.to_string(&other)?,
    };
    let len = text.chars().count();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let target = if target <= len as f64 { len } else { target as usize };
    if target == len || filler.is_empty() {
        return Ok(Value::Str(text));
    }
    check_string_len(machine, target)?;
    charge_len(machine, target)?;
    let padding: String = filler.chars().cycle().take(target - len).collect();
    Ok(Value::from(if at_start {
        format!("{padding}{text}")
    } else {
        format!("{text}{padding}")
    }))
}

fn string_pad_start(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    pad(machine, &this, &args, true)
}

fn string_pad_end(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    pad(machine, &this, &args, false)
}

/// Replaces the first (or every) literal occurrence of the pattern; the
/// replacement may be a string or a function of the match.
fn replace(machine: &mut Machine, this: &Value, args: &[Value], all: bool) -> Completion<Value> {
    let text = this_string(machine, this)?;
    let pattern = string_arg(machine, args, 0)?;
    let replacement = arg(args, 1);
    charge_len(machine, text.len())?;
    let mut positions: Vec<usize> = if pattern.is_empty() {
        if all {
            text.char_indices().map(|(byte, _)| byte).chain([text.len()]).collect()
        } else {
            vec![0]
        }
    } else {
        text.match_indices(&*pattern).map(|(byte, _)| byte).collect()
    };
    if !all {
        positions.truncate(1);
    }
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for position in positions {
        result.push_str(&text[last..position]);
        if machine.is_callable(&replacement) {
            let offset = length_value(char_offset(&text, position));
            let produced = machine.call(
                &replacement,
                Value::Undefined,
                vec![Value::Str(Rc::clone(&pattern)), offset, Value::Str(Rc::clone(&text))],
            )?;
            result.push_str(&machine.to_string(&produced)?);
        } else {
            result.push_str(&machine.to_string(&replacement)?);
        }
        check_string_len(machine, result.len())?;
        last = position + pattern.len();
    }
    result.push_str(&text[last..]);
    Ok(Value::from(result))
}

fn string_replace(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    replace(machine, &this, &args, false)
}

fn string_replace_all(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    replace(machine, &this, &args, true)
}

//
// ─── NUMBER AND BOOLEAN ───────────────────────────────────────────────────────
//

fn this_number(machine: &mut Machine, this: &Value) -> Completion<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        _ => Err(machine.type_error("Number.prototype method called on a non-number")),
    }
}

fn number_ctor(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    if args.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(Value::Number(number_arg(machine, &args, 0)?))
}

fn number_is_integer(_: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    Ok(Value::Bool(matches!(
        arg(&args, 0),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0
    )))
}

fn number_is_finite(_: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    Ok(Value::Bool(matches!(arg(&args, 0), Value::Number(n) if n.is_finite())))
}

fn number_to_fixed(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let n = this_number(machine, &this)?;
    let digits = integer_arg(machine, &args, 0)?;
    if !(0.0..=100.0).contains(&digits) {
        return Err(machine.range_error("toFixed() digits argument must be between 0 and 100"));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let digits = digits as usize;
    Ok(Value::from(to_fixed(n, digits)))
}

/// `Number.prototype.toFixed`: exact-value rounding with ties away from zero.
fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_string(n);
    }
    let magnitude = n.abs();
    // Enough extra digits to see whether the value sits exactly on a tie.
    let exact = format!("{magnitude:.prec$}", prec = digits + 40);
    let cut = exact.len() - 40;
    let (kept, rest) = exact.split_at(cut);
    let tie = rest.starts_with('5') && rest[1..].bytes().all(|b| b == b'0');
    let rounded = if tie {
        increment_decimal(kept.trim_end_matches('.'))
    } else {
        format!("{magnitude:.digits$}")
    };
    if n < 0.0 {
        format!("-{rounded}")
    } else {
        rounded
    }
}

/// Adds one unit in the last place of a non-negative decimal string.
fn increment_decimal(text: &str) -> String {
    let mut digits: Vec<u8> = text.bytes().collect();
    let mut carry = true;
    for byte in digits.iter_mut().rev() {
        if !carry {
            break;
        }
        match *byte {
            b'.' => {}
            b'9' => *byte = b'0',
            _ => {
                *byte += 1;
                carry = false;
            }
        }
    }
    let mut result = String::with_capacity(digits.len() + 1);
    if carry {
        result.push('1');
    }
    result.extend(digits.into_iter().map(char::from));
    result
}

fn number_to_string_method(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let n = this_number(machine, &this)?;
    let radix = match arg(&args, 0) {
        Value::Undefined => 10.0,
        _ => integer_arg(machine, &args, 0)?,
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(machine.range_error("toString() radix must be between 2 and 36"));
    }
    if radix == 10.0 || !n.is_finite() || n.fract() != 0.0 || n.abs() > 9_007_199_254_740_991.0 {
        return Ok(Value::from(number_to_string(n)));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (radix, mut rest) = (radix as u32, n.abs() as u64);
    let mut digits = Vec::new();
    loop {
        let digit = u32::try_from(rest % u64::from(radix)).unwrap_or_default();
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        rest /= u64::from(radix);
        if rest == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(Value::from(digits.into_iter().rev().collect::<String>()))
}

fn boolean_ctor(_: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    Ok(Value::Bool(arg(&args, 0).truthy()))
}

fn boolean_to_string(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    match this {
        Value::Bool(b) => Ok(Value::from(if b { "true" } else { "false" })),
        _ => Err(machine.type_error("Boolean.prototype.toString requires that 'this' be a Boolean")),
    }
}

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Shared body of the error constructors. Called through `new` or `super(...)`
/// it fills in `this`; called plainly it allocates a fresh error.
fn init_error(machine: &mut Machine, this: Value, args: &[Value], proto: ObjId) -> Completion<Value> {
    let target = match this.as_object() {
        Some(id) if machine.heap.inherits(id, proto) => id,
        _ => {
            let Value::Object(id) = machine.make_error(proto, "") else {
                return Ok(Value::Undefined);
            };
            id
        }
    };
    match arg(args, 0) {
        Value::Undefined => {
            machine.heap.get_mut(target).props.retain(|(key, _)| &**key != "message");
        }
        message => {
            let message = machine.to_string(&message)?;
            machine.heap.get_mut(target).define("message", Value::Str(message));
        }
    }
    Ok(Value::Object(target))
}

fn error_ctor(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let proto = machine.intrinsics.error_proto;
    init_error(machine, this, &args, proto)
}

fn type_error_ctor(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let proto = machine.intrinsics.type_error_proto;
    init_error(machine, this, &args, proto)
}

fn range_error_ctor(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let proto = machine.intrinsics.range_error_proto;
    init_error(machine, this, &args, proto)
}

fn reference_error_ctor(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let proto = machine.intrinsics.reference_error_proto;
    init_error(machine, this, &args, proto)
}

fn syntax_error_ctor(machine: &mut Machine, this: Value, args: Vec<Value>) -> Completion<Value> {
    let proto = machine.intrinsics.syntax_error_proto;
    init_error(machine, this, &args, proto)
}

fn error_to_string(machine: &mut Machine, this: Value, _: Vec<Value>) -> Completion<Value> {
    if !matches!(this, Value::Object(_)) {
        return Err(machine.type_error("Error.prototype.toString requires that 'this' be an Object"));
    }
    let name = match machine.get_property(&this, "name")? {
        Value::Undefined => "Error".into(),
        other => machine.to_string(&other)?,
    };
    let message = match machine.get_property(&this, "message")? {
        Value::Undefined => "".into(),
        other => machine.to_string(&other)?,
    };
    Ok(Value::from(match (name.is_empty(), message.is_empty()) {
        (true, _) => message.to_string(),
        (false, true) => name.to_string(),
        (false, false) => format!("{name}: {message}"),
    }))
}

//
// ─── GLOBAL FUNCTIONS ─────────────────────────────────────────────────────────
//

/// Joins the arguments like `Array.prototype.join(" ")` and records the line
/// as the run's latest output.
fn console_log(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let line = join_values(machine, &args, " ")?;
    machine.record_log(line.clone());
    Ok(Value::from(line))
}

fn math_unary(machine: &mut Machine, args: &[Value], f: fn(f64) -> f64) -> Completion<Value> {
    Ok(Value::Number(f(number_arg(machine, args, 0)?)))
}

fn math_floor(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    math_unary(machine, &args, f64::floor)
}

fn math_ceil(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    math_unary(machine, &args, f64::ceil)
}

fn math_round(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    // Halves round towards positive infinity.
    math_unary(machine, &args, |n| {
        if n.is_finite() && n.fract() != 0.0 {
            (n + 0.5).floor()
        } else {
            n
        }
    })
}

fn math_abs(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    math_unary(machine, &args, f64::abs)
}

fn math_sqrt(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    math_unary(machine, &args, f64::sqrt)
}

fn math_trunc(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    math_unary(machine, &args, f64::trunc)
}

fn math_sign(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    math_unary(machine, &args, |n| if n == 0.0 || n.is_nan() { n } else { n.signum() })
}

fn math_pow(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let base = number_arg(machine, &args, 0)?;
    let exponent = number_arg(machine, &args, 1)?;
    Ok(Value::Number(
        if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
            f64::NAN
        } else {
            base.powf(exponent)
        },
    ))
}

fn math_extreme(machine: &mut Machine, args: &[Value], max: bool) -> Completion<Value> {
    let mut result = if max { f64::NEG_INFINITY } else { f64::INFINITY };
    for value in args {
        let n = machine.to_number(value)?;
        if n.is_nan() {
            result = f64::NAN;
        } else if !result.is_nan() && ((max && n > result) || (!max && n < result)) {
            result = n;
        }
    }
    Ok(Value::Number(result))
}

fn math_max(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    math_extreme(machine, &args, true)
}

fn math_min(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    math_extreme(machine, &args, false)
}

fn parse_int(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let text = string_arg(machine, &args, 0)?;
    let radix = match arg(&args, 1) {
        Value::Undefined => 0,
        _ => {
            let radix = integer_arg(machine, &args, 1)?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let radix = if (0.0..=36.0).contains(&radix) { radix as u32 } else { 1 };
            radix
        }
    };
    Ok(Value::Number(parse_int_text(&text, radix)))
}

/// Longest valid integer prefix; `radix` 0 means "detect from the prefix".
fn parse_int_text(text: &str, radix: u32) -> f64 {
    let trimmed = text.trim_start();
    let (sign, mut digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1.0, &trimmed[1..]),
        Some(b'+') => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    let mut radix = radix;
    let hex_prefix = digits.starts_with("0x") || digits.starts_with("0X");
    if (radix == 0 || radix == 16) && hex_prefix {
        digits = &digits[2..];
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value: f64 = 0.0;
    let mut seen = false;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(digit);
        seen = true;
    }
    if seen { sign * value } else { f64::NAN }
}

fn parse_float(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let text = string_arg(machine, &args, 0)?;
    Ok(Value::Number(parse_float_text(&text)))
}

/// Longest prefix of the form `[sign] digits [. digits] [e [sign] digits]`.
fn parse_float_text(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if trimmed[end..].starts_with("Infinity") {
        return if bytes.first() == Some(&b'-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };
    let integer = digits_from(end);
    end += integer;
    let mut fraction = 0;
    if bytes.get(end) == Some(&b'.') {
        fraction = digits_from(end + 1);
        if integer > 0 || fraction > 0 {
            end += 1 + fraction;
        }
    }
    if integer == 0 && fraction == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_start = end + 1;
        if matches!(bytes.get(exponent_start), Some(b'+' | b'-')) {
            exponent_start += 1;
        }
        let exponent = digits_from(exponent_start);
        if exponent > 0 {
            end = exponent_start + exponent;
        }
    }
    trimmed[..end].parse().unwrap_or(f64::NAN)
}

fn is_nan(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    Ok(Value::Bool(number_arg(machine, &args, 0)?.is_nan()))
}

fn is_finite(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    Ok(Value::Bool(number_arg(machine, &args, 0)?.is_finite()))
}

//
// ─── JSON ─────────────────────────────────────────────────────────────────────
//

fn json_stringify(machine: &mut Machine, _: Value, args: Vec<Value>) -> Completion<Value> {
    let indent = match arg(&args, 2) {
        Value::Number(n) if n >= 1.0 => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let width = n.min(10.0) as usize;
            " ".repeat(width)
        }
        Value::Str(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let mut out = String::new();
    let written = serialize(machine, &arg(&args, 0), &indent, 0, &mut out);
    machine.visiting.clear();
    Ok(if written? { Value::from(out) } else { Value::Undefined })
}

fn quote_json(text: &str, out: &mut String) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if u32::from(c) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn newline(out: &mut String, indent: &str, level: usize) {
    if !indent.is_empty() {
        out.push('\n');
        for _ in 0..level {
            out.push_str(indent);
        }
    }
}

/// Writes `value` as JSON; `Ok(false)` when the value has no JSON form.
fn serialize(machine: &mut Machine, value: &Value, indent: &str, level: usize, out: &mut String) -> Completion<bool> {
    machine.charge(1)?;
    check_string_len(machine, out.len())?;
    let id = match value {
        Value::Undefined => return Ok(false),
        Value::Null => {
            out.push_str("null");
            return Ok(true);
        }
        Value::Bool(b) => {
            out.push_str(if *b { "true" } else { "false" });
            return Ok(true);
        }
        Value::Number(n) => {
            out.push_str(&if n.is_finite() { number_to_string(*n) } else { "null".to_string() });
            return Ok(true);
        }
        Value::Str(s) => {
            quote_json(s, out);
            return Ok(true);
        }
        Value::Object(id) => *id,
    };
    if machine.is_callable(value) {
        return Ok(false);
    }
    if machine.visiting.contains(&id) {
        return Err(machine.type_error("Converting circular structure to JSON"));
    }
    machine.visiting.push(id);
    let separator = if indent.is_empty() { ":" } else { ": " };
    if machine.is_array(value) {
        let values = items(machine, id);
        out.push('[');
        for (index, item) in values.iter().enumerate() {
            if index > 0 {
                out.push(',');
            }
            newline(out, indent, level + 1);
            if !serialize(machine, item, indent, level + 1, out)? {
                out.push_str("null");
            }
        }
        if !values.is_empty() {
            newline(out, indent, level);
        }
        out.push(']');
    } else {
        let entries: Vec<(Rc<str>, Value)> = machine
            .heap
            .get(id)
            .props
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Data(value) => Some((Rc::clone(key), value.clone())),
                Slot::Accessor { .. } => None,
            })
            .collect();
        out.push('{');
        let mut first = true;
        for (key, item) in entries {
            let rollback = out.len();
            if !first {
                out.push(',');
            }
            newline(out, indent, level + 1);
            quote_json(&key, out);
            out.push_str(separator);
            if serialize(machine, &item, indent, level + 1, out)? {
                first = false;
            } else {
                out.truncate(rollback);
            }
        }
        if !first {
            newline(out, indent, level);
        }
        out.push('}');
    }
    machine.visiting.pop();
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playground::{Interpreter, Sandbox};

    fn output(source: &str) -> String {
        let outcome = Interpreter::default().execute(source);
        match outcome.captured_text() {
            Some(text) => text.to_string(),
            None => panic!("{source:?} failed: {outcome:?}"),
        }
    }

    fn error(source: &str) -> String {
        let outcome = Interpreter::default().execute(source);
        match outcome.failure() {
            Some(failure) => failure.message.clone(),
            None => panic!("{source:?} unexpectedly succeeded: {outcome:?}"),
        }
    }

    #[test]
    fn array_methods() {
        assert_eq!(
            output("const a = [3, 1, 2]; a.push(4); console.log(a.length, a.join('-'), a.indexOf(2), a.includes(5))"),
            "4 3-1-2-4 2 false"
        );
        assert_eq!(
            output("console.log([1, 2, 3, 4].filter(n => n % 2 === 0).map(n => n * 10).join())"),
            "20,40"
        );
        assert_eq!(
            output("console.log([1, 2, 3].reduce((sum, n) => sum + n, 0), [5, 6].find(n => n > 5), [5, 6].findIndex(n => n > 9))"),
            "6 6 -1"
        );
        assert_eq!(
            output("const a = [1, 2, 3]; console.log(a.shift(), a.pop(), a.unshift(0), a.join())"),
            "1 3 2 0,2"
        );
        assert_eq!(
            output("console.log([1, 2, 3, 4, 5].slice(1, -1).concat([9], 10).reverse().join())"),
            "10,9,4,3,2"
        );
        assert_eq!(
            output("console.log([1, 2].some(n => n > 1), [1, 2].every(n => n > 1))"),
            "true false"
        );
    }

    #[test]
    fn sort_defaults_to_string_order_and_is_stable() {
        assert_eq!(output("console.log([10, 9, 1, 100].sort().join())"), "1,10,100,9");
        assert_eq!(
            output("console.log([10, 9, 1, 100].sort((a, b) => a - b).join())"),
            "1,9,10,100"
        );
        assert_eq!(
            output(
                "const crew = [{n: 'a', r: 2}, {n: 'b', r: 1}, {n: 'c', r: 2}];\n\
                 console.log(crew.sort((x, y) => x.r - y.r).map(c => c.n).join(''))"
            ),
            "bac"
        );
    }

    #[test]
    fn reduce_of_empty_array_throws() {
        assert_eq!(
            error("[].reduce((a, b) => a + b)"),
            "TypeError: Reduce of empty array with no initial value"
        );
    }

    #[test]
    fn string_methods() {
        assert_eq!(
            output("const s = '  Mission Control  '; console.log(s.trim().toUpperCase(), s.trim().length)"),
            "MISSION CONTROL 15"
        );
        assert_eq!(
            output("console.log('orbit'.slice(-3), 'orbit'.substring(3, 1), 'orbit'.charAt(0), 'orbit'.indexOf('b'))"),
            "bit rb o 2"
        );
        assert_eq!(
            output("console.log('a,b,,c'.split(',').length, 'ab'.repeat(3), '7'.padStart(3, '0'), 'x'.padEnd(3, '.'))"),
            "4 ababab 007 x.."
        );
        assert_eq!(
            output("console.log('moon moon'.replace('moon', 'sun'), 'moon moon'.replaceAll('moon', 'sun'))"),
            "sun moon sun sun"
        );
        assert_eq!(
            output("console.log('rocket'.startsWith('ro'), 'rocket'.endsWith('et'), 'rocket'.includes('ck'))"),
            "true true true"
        );
    }

    #[test]
    fn numbers_format_like_javascript() {
        assert_eq!(
            output("console.log((2.5).toFixed(0), (1.005).toFixed(2), (3.14159).toFixed(2), (-1.5).toFixed(0))"),
            "3 1.00 3.14 -2"
        );
        assert_eq!(output("console.log(0.1 + 0.2, 1 / 0, -(0), (255).toString(16))"), "0.30000000000000004 Infinity 0 ff");
        assert_eq!(
            output("console.log(parseInt('42px'), parseFloat('3.5e2 km'), isNaN('abc'), Number(''), Number('12px'))"),
            "42 350 true 0 NaN"
        );
    }

    #[test]
    fn math_functions() {
        assert_eq!(
            output("console.log(Math.round(2.5), Math.round(-2.5), Math.max(1, 7, 3), Math.min(), Math.sqrt(16), Math.pow(2, 10))"),
            "3 -2 7 Infinity 4 1024"
        );
    }

    #[test]
    fn object_helpers() {
        assert_eq!(
            output(
                "const ship = { name: 'Nova', crew: 3 };\n\
                 console.log(Object.keys(ship).join(), Object.values(ship).join(), Object.entries(ship).length)"
            ),
            "name,crew Nova,3 2"
        );
        assert_eq!(
            output("console.log(Object.assign({}, {a: 1}, {b: 2}).b, ({a: 1}).hasOwnProperty('a'))"),
            "2 true"
        );
    }

    #[test]
    fn json_stringify_formats() {
        assert_eq!(
            output("console.log(JSON.stringify({ name: \"Nova\", tags: [1, \"x\", null], skip: undefined, f() {} }))"),
            "{\"name\":\"Nova\",\"tags\":[1,\"x\",null]}"
        );
        assert_eq!(
            output("console.log(JSON.stringify([1, { a: 2 }], null, 2))"),
            "[\n  1,\n  {\n    \"a\": 2\n  }\n]"
        );
        assert_eq!(
            error("const o = {}; o.self = o; JSON.stringify(o)"),
            "TypeError: Converting circular structure to JSON"
        );
    }

    #[test]
    fn error_constructors() {
        assert_eq!(
            output("const e = new TypeError('bad fuel'); console.log(e.name, e.message, e instanceof Error, String(e))"),
            "TypeError bad fuel true TypeError: bad fuel"
        );
        assert_eq!(error("throw new RangeError('too far')"), "RangeError: too far");
        assert_eq!(error("throw Error()"), "Error");
    }

    #[test]
    fn cyclic_arrays_join_without_recursing() {
        assert_eq!(output("const a = [1]; a.push(a); console.log(a.join())"), "1,");
    }

    #[test]
    fn array_constructor_and_helpers() {
        assert_eq!(
            output("console.log(new Array(3).length, Array.isArray([]), Array.isArray('x'), Array.from('abc').join('|'))"),
            "3 true false a|b|c"
        );
    }

    #[test]
    fn to_fixed_ties_round_away_from_zero() {
        assert_eq!(to_fixed(0.5, 0), "1");
        assert_eq!(to_fixed(1.25, 1), "1.3");
        assert_eq!(to_fixed(9.995, 2), "9.99");
        assert_eq!(to_fixed(99.5, 0), "100");
        assert_eq!(to_fixed(-0.0001, 2), "-0.00");
        assert_eq!(to_fixed(-0.0, 1), "0.0");
    }

    #[test]
    fn parses_numeric_prefixes() {
        assert_eq!(parse_int_text("0x1A", 0), 26.0);
        assert_eq!(parse_int_text("  -12.9", 0), -12.0);
        assert!(parse_int_text("px", 10).is_nan());
        assert_eq!(parse_float_text(".5"), 0.5);
        assert_eq!(parse_float_text("-Infinity and beyond"), f64::NEG_INFINITY);
        assert!(parse_float_text("e5").is_nan());
    }
}
