use std::{fmt, io};

use strum::FromRepr;

/// Largest number of registers a single request may address.
pub const MAX_REGISTERS: usize = 64;

/// Function codes the probe knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHoldingRegisters = 0x03,
    WriteMultipleRegisters = 0x10,
}

/// How a numeric argument is written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberEncoding {
    #[default]
    Decimal,
    Hexadecimal,
}

impl NumberEncoding {
    pub fn radix(self) -> u32 {
        match self {
            NumberEncoding::Decimal => 10,
            NumberEncoding::Hexadecimal => 16,
        }
    }
}

impl fmt::Display for NumberEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberEncoding::Decimal => write!(f, "decimal"),
            NumberEncoding::Hexadecimal => write!(f, "hexadecimal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Token is not one of the recognised flags.
    BadArgument(String),
    /// Flag was the last token and has nothing to consume.
    MissingValue(&'static str),
    InvalidNumber {
        flag: &'static str,
        token: String,
        encoding: NumberEncoding,
    },
    /// `-v` appeared while the register count was still unset or zero.
    ValuesBeforeCount,
    TooManyRegisters(u16),
    TooManyValues(usize),
    MissingTarget,
    /// A read was requested without a non-zero `-n`.
    MissingCount,
    MissingValues,
    ValueCountMismatch {
        count: u16,
        values: usize,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadArgument(token) => write!(f, "bad arg '{token}'"),
            ParseError::MissingValue(flag) => write!(f, "missing value after {flag}"),
            ParseError::InvalidNumber {
                flag,
                token,
                encoding,
            } => write!(f, "invalid {encoding} number '{token}' for {flag}"),
            ParseError::ValuesBeforeCount => {
                write!(f, "-v requires a non-zero register count (-n) first")
            }
            ParseError::TooManyRegisters(count) => write!(
                f,
                "register count {count} exceeds the maximum of {MAX_REGISTERS}"
            ),
            ParseError::TooManyValues(len) => write!(
                f,
                "{len} register values exceed the maximum of {MAX_REGISTERS}"
            ),
            ParseError::MissingTarget => write!(f, "missing target address (-ip)"),
            ParseError::MissingCount => {
                write!(f, "read holding registers requires a non-zero register count (-n)")
            }
            ParseError::MissingValues => {
                write!(f, "write multiple registers requires values (-v)")
            }
            ParseError::ValueCountMismatch { count, values } => write!(
                f,
                "register count is {count} but {values} value(s) were supplied"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Register values for a write, never longer than [`MAX_REGISTERS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterValues(Vec<u16>);

impl RegisterValues {
    pub fn new(values: Vec<u16>) -> Result<Self, ParseError> {
        if values.len() > MAX_REGISTERS {
            return Err(ParseError::TooManyValues(values.len()));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single probe request, built once from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub target: String,
    pub slave_id: u8,
    /// Raw function code; unsupported codes are kept so they can be reported.
    pub function: u8,
    pub address: u16,
    pub count: u16,
    pub values: Option<RegisterValues>,
}

impl Request {
    /// Parse the argument tokens (program name excluded).
    ///
    /// Flags are applied in order and a repeated flag overwrites the earlier
    /// value. `-v` must come after a non-zero `-n`.
    pub fn parse<I, S>(tokens: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens = Tokens::new(tokens);
        let mut request = Request::default();

        while let Some(token) = tokens.next() {
            match token.as_str() {
                "-ip" => request.target = tokens.value("-ip")?,
                "-s" => request.slave_id = tokens.number("-s", NumberEncoding::Decimal)?,
                "-f" => request.function = tokens.number("-f", NumberEncoding::Decimal)?,
                "-a" => {
                    let encoding = tokens.encoding();
                    request.address = tokens.number("-a", encoding)?;
                }
                "-n" => request.count = tokens.number("-n", NumberEncoding::Decimal)?,
                "-v" => {
                    if request.count == 0 {
                        return Err(ParseError::ValuesBeforeCount);
                    }
                    if request.count as usize > MAX_REGISTERS {
                        return Err(ParseError::TooManyRegisters(request.count));
                    }
                    let encoding = tokens.encoding();
                    let list = tokens.value("-v")?;
                    let values = list
                        .split(':')
                        .map(|item| parse_number("-v", item, encoding))
                        .collect::<Result<Vec<u16>, _>>()?;
                    request.values = Some(RegisterValues::new(values)?);
                }
                _ => return Err(ParseError::BadArgument(token)),
            }
        }

        request.validate()?;
        Ok(request)
    }

    pub fn function_code(&self) -> Option<FunctionCode> {
        FunctionCode::from_repr(self.function)
    }

    fn validate(&self) -> Result<(), ParseError> {
        if self.target.is_empty() {
            return Err(ParseError::MissingTarget);
        }
        if self.count as usize > MAX_REGISTERS {
            return Err(ParseError::TooManyRegisters(self.count));
        }
        if self.function_code() == Some(FunctionCode::ReadHoldingRegisters) && self.count == 0 {
            return Err(ParseError::MissingCount);
        }
        if self.function_code() == Some(FunctionCode::WriteMultipleRegisters) {
            let values = self.values.as_ref().ok_or(ParseError::MissingValues)?;
            if values.len() != self.count as usize {
                return Err(ParseError::ValueCountMismatch {
                    count: self.count,
                    values: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Print the target and every request field, the way the probe echoes them before connecting.
    pub fn write_echo<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "\nTarget IP: {}", self.target)?;
        writeln!(out, "\nModbus PDU:")?;
        writeln!(out, "Slave ID: {}", self.slave_id)?;
        writeln!(out, "Function: {}", self.function)?;
        writeln!(out, "Address: {}", self.address)?;
        writeln!(out, "Number of registers: {}", self.count)?;
        if self.function_code() == Some(FunctionCode::WriteMultipleRegisters) {
            if let Some(values) = &self.values {
                for (i, value) in values.as_slice().iter().enumerate() {
                    writeln!(out, "Value {i}: {value}")?;
                }
            }
        }
        writeln!(out)
    }
}

struct Tokens {
    inner: std::iter::Peekable<std::vec::IntoIter<String>>,
}

impl Tokens {
    fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokens.into_iter().map(Into::into).collect::<Vec<_>>();
        Self {
            inner: tokens.into_iter().peekable(),
        }
    }

    fn next(&mut self) -> Option<String> {
        self.inner.next()
    }

    fn value(&mut self, flag: &'static str) -> Result<String, ParseError> {
        self.inner.next().ok_or(ParseError::MissingValue(flag))
    }

    /// Consume an optional `-h` marker in front of a value.
    fn encoding(&mut self) -> NumberEncoding {
        if self.inner.next_if(|token| token == "-h").is_some() {
            NumberEncoding::Hexadecimal
        } else {
            NumberEncoding::Decimal
        }
    }

    fn number<T: TryFrom<u32>>(
        &mut self,
        flag: &'static str,
        encoding: NumberEncoding,
    ) -> Result<T, ParseError> {
        let token = self.value(flag)?;
        parse_number(flag, &token, encoding)
    }
}

fn parse_number<T: TryFrom<u32>>(
    flag: &'static str,
    token: &str,
    encoding: NumberEncoding,
) -> Result<T, ParseError> {
    let digits = match encoding {
        NumberEncoding::Decimal => token,
        NumberEncoding::Hexadecimal => token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token),
    };

    // `from_str_radix` would also take a leading `+`.
    if digits.starts_with('+') {
        return Err(ParseError::InvalidNumber {
            flag,
            token: token.to_string(),
            encoding,
        });
    }

    u32::from_str_radix(digits, encoding.radix())
        .ok()
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| ParseError::InvalidNumber {
            flag,
            token: token.to_string(),
            encoding,
        })
}
