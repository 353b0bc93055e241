use crate::core::error::{ChartError, ChartResult};
use crate::core::registry::{ChartFormat, format_from_file_name};

pub const DEFAULT_MARGIN: u32 = 4;
pub const MAX_MARGIN: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCorrection {
    #[default]
    L,
    M,
    Q,
    H,
}

impl ErrorCorrection {
    pub fn parse(value: &str) -> ChartResult<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "Q" => Ok(Self::Q),
            "H" => Ok(Self::H),
            _ => Err(ChartError::validation(
                "chld",
                format!("unknown error correction level `{value}`"),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        }
    }
}

/// How `chl` is turned into bytes before it is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    pub fn parse(value: &str) -> ChartResult<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(Self::Utf8),
            "ISO-8859-1" | "ISO8859-1" | "LATIN1" => Ok(Self::Latin1),
            _ => Err(ChartError::validation(
                "choe",
                format!("unsupported output encoding `{value}`"),
            )),
        }
    }

    pub fn encode(&self, text: &str) -> ChartResult<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| {
                    ChartError::validation("chl", "content is not representable in ISO-8859-1")
                }),
        }
    }
}

/// Raw query parameters, as received.
#[derive(Debug, Clone, Default)]
pub struct ChartParams {
    pub chl: Option<String>,
    pub chs: Option<String>,
    pub chld: Option<String>,
    pub choe: Option<String>,
    pub cht: Option<String>,
}

/// Server-side bounds applied while validating a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_dimension: 4096,
            jpeg_quality: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub format: ChartFormat,
    pub content: String,
    pub width: u32,
    pub height: u32,
    pub error_correction: ErrorCorrection,
    pub margin: u32,
    pub encoding: TextEncoding,
    pub quality: u8,
}

impl ChartRequest {
    /// Builds a request from a GET: the content comes from `chl`.
    pub fn from_query(
        file_name: &str,
        params: ChartParams,
        limits: &RequestLimits,
    ) -> ChartResult<Self> {
        let format = format_from_file_name(file_name)?;
        let content = params
            .chl
            .clone()
            .ok_or_else(|| ChartError::validation("chl", "missing"))?;
        Self::build(format, content, &params, limits)
    }

    /// Builds a request from a POST: the content is the request body and
    /// `chl` is ignored.
    pub fn from_body(
        file_name: &str,
        body: String,
        params: ChartParams,
        limits: &RequestLimits,
    ) -> ChartResult<Self> {
        let format = format_from_file_name(file_name)?;
        Self::build(format, body, &params, limits)
    }

    fn build(
        format: ChartFormat,
        content: String,
        params: &ChartParams,
        limits: &RequestLimits,
    ) -> ChartResult<Self> {
        if let Some(cht) = params.cht.as_deref() {
            if !cht.eq_ignore_ascii_case("qr") {
                return Err(ChartError::validation(
                    "cht",
                    format!("unsupported chart type `{cht}`"),
                ));
            }
        }

        let size = params
            .chs
            .as_deref()
            .ok_or_else(|| ChartError::validation("chs", "missing"))?;
        let (width, height) = parse_size(size)?;

        let (error_correction, margin) = match params.chld.as_deref() {
            Some(chld) => parse_chld(chld)?,
            None => (ErrorCorrection::default(), DEFAULT_MARGIN),
        };

        let encoding = match params.choe.as_deref() {
            Some(choe) => TextEncoding::parse(choe)?,
            None => TextEncoding::default(),
        };

        let request = Self {
            format,
            content,
            width,
            height,
            error_correction,
            margin,
            encoding,
            quality: limits.jpeg_quality,
        };
        request.validate(limits)?;
        Ok(request)
    }

    /// Checks invariants that hold however the request was constructed.
    pub fn validate(&self, limits: &RequestLimits) -> ChartResult<()> {
        if self.content.is_empty() {
            return Err(ChartError::validation("chl", "content is empty"));
        }
        let max = limits.max_dimension;
        if self.width == 0 || self.height == 0 || self.width > max || self.height > max {
            return Err(ChartError::validation(
                "chs",
                format!("each dimension must be between 1 and {max}"),
            ));
        }
        if self.margin > MAX_MARGIN {
            return Err(ChartError::validation(
                "chld",
                format!("margin must be at most {MAX_MARGIN}"),
            ));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ChartError::validation("quality", "must be between 1 and 100"));
        }
        self.encoding.encode(&self.content).map(|_| ())
    }

    pub fn content_bytes(&self) -> ChartResult<Vec<u8>> {
        self.encoding.encode(&self.content)
    }
}

/// Parses `chs`, e.g. `100x100`.
pub fn parse_size(value: &str) -> ChartResult<(u32, u32)> {
    let invalid = || ChartError::validation("chs", format!("expected WIDTHxHEIGHT, got `{value}`"));
    let (width, height) = value.split_once(|c: char| c == 'x' || c == 'X').ok_or_else(invalid)?;
    let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok((width, height))
}

/// Parses `chld`, either `M` or `M|margin`.
pub fn parse_chld(value: &str) -> ChartResult<(ErrorCorrection, u32)> {
    match value.split_once('|') {
        None => Ok((ErrorCorrection::parse(value)?, DEFAULT_MARGIN)),
        Some((level, margin)) => {
            let level = ErrorCorrection::parse(level)?;
            let margin = margin.trim().parse::<u32>().map_err(|_| {
                ChartError::validation("chld", format!("invalid margin `{margin}`"))
            })?;
            Ok((level, margin))
        }
    }
}
