//! JavaScript value representation and the primitive conversions.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::object::{JsObject, ObjectClass};

/// Shared handle to a heap object.
pub type ObjectRef = Rc<RefCell<JsObject>>;

/// A JavaScript value.
#[derive(Clone, Default)]
pub enum Value {
    /// The undefined value
    #[default]
    Undefined,
    /// The null value
    Null,
    /// A boolean
    Boolean(bool),
    /// A number (IEEE 754 double)
    Number(f64),
    /// A string
    String(String),
    /// An object, including functions and arrays
    Object(ObjectRef),
}

impl Value {
    /// Wraps a fresh object.
    pub fn object(obj: JsObject) -> Self {
        Value::Object(Rc::new(RefCell::new(obj)))
    }

    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true for undefined and null.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns the object handle, if any.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns true for objects with a `[[Call]]` method.
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    /// ToBoolean (E5 Section 9.2).
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// ToNumber (E5 Section 9.3).
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => self.to_primitive().to_number(),
        }
    }

    /// ToInt32 (E5 Section 9.5).
    pub fn to_int32(&self) -> i32 {
        to_uint32(self.to_number()) as i32
    }

    /// ToUint32 (E5 Section 9.6).
    pub fn to_uint32(&self) -> u32 {
        to_uint32(self.to_number())
    }

    /// ToString (E5 Section 9.8).
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
            Value::Object(_) => self.to_primitive().to_js_string(),
        }
    }

    /// ToPrimitive without calling user code.
    ///
    /// Objects convert the way the default `toString` methods would:
    /// arrays join their elements, functions and regexps print their
    /// source form, errors print `name: message`.
    pub fn to_primitive(&self) -> Value {
        let Value::Object(obj) = self else {
            return self.clone();
        };
        let obj = obj.borrow();
        let s = match &obj.class {
            ObjectClass::Array => {
                let len = obj.get_own("length").map(|v| v.to_uint32()).unwrap_or(0);
                let mut parts = Vec::with_capacity(len as usize);
                for i in 0..len {
                    let elem = obj.get_own(&i.to_string()).unwrap_or_default();
                    parts.push(if elem.is_nullish() {
                        String::new()
                    } else {
                        elem.to_js_string()
                    });
                }
                parts.join(",")
            }
            ObjectClass::Function(closure) => {
                let name = closure.template.name.as_deref().unwrap_or("");
                format!("function {}() {{ [bytecode] }}", name)
            }
            ObjectClass::Native(native) => {
                format!("function {}() {{ [native code] }}", native.name)
            }
            ObjectClass::RegExp => {
                let source = obj.get_own("source").map(|v| v.to_js_string()).unwrap_or_default();
                let mut flags = String::new();
                for (name, flag) in [("global", 'g'), ("ignoreCase", 'i'), ("multiline", 'm')] {
                    if obj.get_own(name).is_some_and(|v| v.to_boolean()) {
                        flags.push(flag);
                    }
                }
                format!("/{}/{}", source, flags)
            }
            ObjectClass::Error => {
                let name = obj.get_own("name").map(|v| v.to_js_string()).unwrap_or_else(|| "Error".into());
                let message = obj.get_own("message").map(|v| v.to_js_string()).unwrap_or_default();
                if message.is_empty() {
                    name
                } else {
                    format!("{}: {}", name, message)
                }
            }
            ObjectClass::Arguments => "[object Arguments]".to_string(),
            ObjectClass::Object | ObjectClass::Enumerator(_) => "[object Object]".to_string(),
        };
        Value::String(s)
    }

    /// Returns the `typeof` string of this value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

// Objects can be cyclic, so only their class is printed.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Object(obj) => write!(f, "Object({})", obj.borrow().class.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// Number to string conversion (E5 Section 9.8.1).
///
/// Uses the shortest digit string that round-trips, then lays it out in
/// plain or exponential form.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let sign = if n < 0.0 { "-" } else { "" };
    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e-7".
    let formatted = format!("{:e}", n.abs());
    let Some((mantissa, exp)) = formatted.split_once('e') else {
        return formatted;
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let e: i32 = exp.parse().unwrap_or(0);
    let point = e + 1;

    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let exp_sign = if point - 1 < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, exp_sign, (point - 1).abs())
        } else {
            format!("{}.{}e{}{}", first, rest, exp_sign, (point - 1).abs())
        }
    };
    format!("{}{}", sign, body)
}

fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// String to number conversion (E5 Section 9.3.1).
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches(is_js_whitespace);
    if s.is_empty() {
        return 0.0;
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return f64::NAN;
        }
        return hex
            .chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0.0, |acc, d| acc * 16.0 + d as f64);
    }

    let (negative, unsigned) = match s.as_bytes()[0] {
        b'+' => (false, &s[1..]),
        b'-' => (true, &s[1..]),
        _ => (false, s),
    };
    let magnitude = if unsigned == "Infinity" {
        f64::INFINITY
    } else if is_decimal_literal(unsigned) {
        unsigned.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    };
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// `StrUnsignedDecimalLiteral`: digits with an optional fraction and
/// exponent, at least one digit in the mantissa.
fn is_decimal_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut mantissa_digits = 0;

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        mantissa_digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            mantissa_digits += 1;
        }
    }
    if mantissa_digits == 0 {
        return false;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}
