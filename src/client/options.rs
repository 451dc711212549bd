
use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
    time::Duration,
};

use percent_encoding::percent_decode_str;
use typed_builder::TypedBuilder;

use crate::{
    error::{Error, Result},
    event::{command::CommandEvent, EventHandler},
    selection_criteria::{ReadPreference, SelectionCriteria, TagSet},
};

pub(crate) const DEFAULT_PORT: u16 = 27017;

const URI_SCHEME: &str = "mongodb://";

/// An enum representing the address of a router or database server.
#[derive(Clone, Debug, Eq)]
#[non_exhaustive]
pub enum ServerAddress {
    /// A TCP/IP host and port combination.
    Tcp {
        /// The hostname or IP address where the server can be found.
        host: String,

        /// The TCP port that the server is listening on.
        ///
        /// The default is 27017.
        port: Option<u16>,
    },
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self::Tcp {
            host: "localhost".into(),
            port: None,
        }
    }
}

impl PartialEq for ServerAddress {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Tcp { host, port },
                Self::Tcp {
                    host: other_host,
                    port: other_port,
                },
            ) => {
                host == other_host
                    && port.unwrap_or(DEFAULT_PORT) == other_port.unwrap_or(DEFAULT_PORT)
            }
        }
    }
}

impl Hash for ServerAddress {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        match self {
            Self::Tcp { host, port } => {
                host.hash(state);
                port.unwrap_or(DEFAULT_PORT).hash(state);
            }
        }
    }
}

impl FromStr for ServerAddress {
    type Err = Error;

    fn from_str(address: &str) -> Result<Self> {
        ServerAddress::parse(address)
    }
}

impl ServerAddress {
    /// Parses an address string into a `ServerAddress`. Accepts `host`, `host:port` and
    /// bracketed IPv6 literals such as `[::1]:27018`.
    pub fn parse(address: impl AsRef<str>) -> Result<Self> {
        let address = address.as_ref();

        let (hostname, port) = if let Some(rest) = address.strip_prefix('[') {
            let (hostname, after) = rest.split_once(']').ok_or_else(|| {
                Error::invalid_argument(format!(
                    "invalid server address \"{}\"; missing closing bracket",
                    address
                ))
            })?;
            let port = match after {
                "" => None,
                port => Some(port.strip_prefix(':').ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "invalid server address \"{}\"; expected ':' after ']'",
                        address
                    ))
                })?),
            };
            (hostname, port)
        } else {
            let mut parts = address.split(':');
            let hostname = parts.next().unwrap_or_default();
            let port = parts.next();
            if parts.next().is_some() {
                return Err(Error::invalid_argument(format!(
                    "address \"{}\" contains more than one unescaped ':'",
                    address
                )));
            }
            (hostname, port)
        };

        if hostname.is_empty() {
            return Err(Error::invalid_argument(format!(
                "invalid server address \"{}\"; hostname cannot be empty",
                address
            )));
        }

        let port = match port {
            Some(part) => {
                let port = u16::from_str(part).map_err(|_| {
                    Error::invalid_argument(format!(
                        "port must be valid 16-bit unsigned integer, instead got: {}",
                        part
                    ))
                })?;

                if port == 0 {
                    return Err(Error::invalid_argument(format!(
                        "invalid server address \"{}\"; port must be non-zero",
                        address
                    )));
                }

                Some(port)
            }
            None => None,
        };

        Ok(Self::Tcp {
            host: hostname.to_lowercase(),
            port,
        })
    }

    /// The hostname or IP address of this address.
    pub fn host(&self) -> &str {
        match self {
            Self::Tcp { host, .. } => host.as_str(),
        }
    }

    /// The port of this address, if one was specified.
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Tcp { port, .. } => *port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => {
                write!(fmt, "[{}]:{}", host, port.unwrap_or(DEFAULT_PORT))
            }
            Self::Tcp { host, port } => write!(fmt, "{}:{}", host, port.unwrap_or(DEFAULT_PORT)),
        }
    }
}

/// Contains the options that can be used to create a new [`Client`](../struct.Client.html).
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct ClientOptions {
    /// The seed list of the deployment. [`Client::with_uri_str`](crate::Client::with_uri_str)
    /// refuses a topology that already describes servers but none of these.
    ///
    /// Defaults to the `localhost` address on port 27017.
    #[builder(default_code = "vec![ServerAddress::default()]")]
    pub hosts: Vec<ServerAddress>,

    /// The application name reported with every routed command, in
    /// [`CommandRoutedEvent`](crate::event::command::CommandRoutedEvent)s and tracing events.
    pub app_name: Option<String>,

    /// The handler that should process all command-related events.
    ///
    /// Note that monitoring command events may incur a performance penalty.
    #[builder(setter(strip_option))]
    pub command_event_handler: Option<EventHandler<CommandEvent>>,

    /// The amount of latency beyond the fastest suitable server that a server may have and still
    /// be considered for selection.
    ///
    /// The default value is 15 ms.
    pub local_threshold: Option<Duration>,

    /// The default selection criteria for operations that do not specify their own. Operations
    /// inside a transaction use the transaction's criteria instead.
    pub selection_criteria: Option<SelectionCriteria>,

    /// The amount of time the client should attempt to select a server for an operation before
    /// timing out.
    ///
    /// The default value is 30 seconds.
    pub server_selection_timeout: Option<Duration>,

    /// Limit on the number of bytes of a command or reply document included in tracing events.
    /// Longer documents are truncated.
    ///
    /// The default value is 1000.
    pub tracing_max_document_length_bytes: Option<usize>,
}

#[derive(Debug, Default)]
struct ClientOptionsParser {
    hosts: Vec<ServerAddress>,
    app_name: Option<String>,
    local_threshold: Option<Duration>,
    server_selection_timeout: Option<Duration>,
    read_preference: Option<ReadPreference>,
    read_preference_tags: Option<Vec<TagSet>>,
}

impl ClientOptions {
    /// Parses a connection string into a `ClientOptions` struct.
    ///
    /// The format of a connection string is described
    /// [here](https://www.mongodb.com/docs/manual/reference/connection-string/#connection-string-formats).
    /// Authentication and TLS are not handled by this crate, so credentials in the connection
    /// string are rejected.
    ///
    /// The following options are supported (options are case insensitive):
    ///
    ///   * `appName`: maps to the `app_name` field
    ///   * `localThresholdMS`: maps to the `local_threshold` field
    ///   * `readPreference`: maps to the `ReadPreference` enum variant of the
    ///     `selection_criteria` field
    ///   * `readPreferenceTags`: maps to the `tag_sets` field of the read preference options;
    ///     may be repeated
    ///   * `serverSelectionTimeoutMS`: maps to the `server_selection_timeout` field
    pub fn parse(s: impl AsRef<str>) -> Result<Self> {
        let parser = ClientOptionsParser::parse(s.as_ref())?;
        Ok(Self {
            hosts: parser.hosts,
            app_name: parser.app_name,
            local_threshold: parser.local_threshold,
            server_selection_timeout: parser.server_selection_timeout,
            selection_criteria: parser.read_preference.map(Into::into),
            ..Default::default()
        })
    }
}

impl ClientOptionsParser {
    fn parse(s: &str) -> Result<Self> {
        let after_scheme = s.strip_prefix(URI_SCHEME).ok_or_else(|| {
            Error::invalid_argument(format!(
                "connection string must start with \"{}\"",
                URI_SCHEME
            ))
        })?;

        let (host_section, rest) = match after_scheme.split_once('/') {
            Some((hosts, rest)) => (hosts, Some(rest)),
            None if after_scheme.contains('?') => {
                return Err(Error::invalid_argument(
                    "connection string options must be preceded by '/'",
                ))
            }
            None => (after_scheme, None),
        };

        if host_section.contains('@') {
            return Err(Error::invalid_argument(
                "credentials are not supported in the connection string",
            ));
        }

        let hosts = host_section
            .split(',')
            .map(|host| {
                let host = percent_decode(host, "hosts")?;
                ServerAddress::parse(host)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut parser = ClientOptionsParser {
            hosts,
            ..Default::default()
        };

        if let Some(options) = rest.and_then(|rest| rest.split_once('?').map(|(_, o)| o)) {
            parser.parse_options(options)?;
        }

        Ok(parser)
    }

    fn parse_options(&mut self, options: &str) -> Result<()> {
        if options.is_empty() {
            return Ok(());
        }

        for option_pair in options.split('&') {
            let (key, value) = option_pair.split_once('=').ok_or_else(|| {
                Error::invalid_argument(format!(
                    "connection string options is not a `key=value` pair: {}",
                    option_pair,
                ))
            })?;

            let value = percent_decode(value, key)?;
            self.parse_option_pair(&key.to_lowercase(), &value)?;
        }

        if let Some(tags) = self.read_preference_tags.take() {
            self.read_preference = match self.read_preference.take() {
                Some(read_pref) => Some(read_pref.with_tags(tags)?),
                None => {
                    return Err(Error::invalid_argument(
                        "cannot set read preference tags without also setting read preference \
                         mode",
                    ))
                }
            };
        }

        Ok(())
    }

    fn parse_option_pair(&mut self, key: &str, value: &str) -> Result<()> {
        let get_ms = |option: &str| -> Result<Duration> {
            value.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                Error::invalid_argument(format!(
                    "connection string `{}` option must be a non-negative integer",
                    option
                ))
            })
        };

        match key {
            "appname" => self.app_name = Some(value.to_string()),
            "localthresholdms" => self.local_threshold = Some(get_ms("localThresholdMS")?),
            "serverselectiontimeoutms" => {
                self.server_selection_timeout = Some(get_ms("serverSelectionTimeoutMS")?)
            }
            "readpreference" => self.read_preference = Some(ReadPreference::from_mode(value)?),
            "readpreferencetags" => {
                let tags = if value.is_empty() {
                    TagSet::new()
                } else {
                    value
                        .split(',')
                        .map(|tag| match tag.split_once(':') {
                            Some((k, v)) if !k.is_empty() && !v.contains(':') => {
                                Ok((k.to_string(), v.to_string()))
                            }
                            _ => Err(Error::invalid_argument(format!(
                                "'{}' is not a valid read preference tag (which must be of the \
                                 form 'key:value')",
                                value,
                            ))),
                        })
                        .collect::<Result<TagSet>>()?
                };

                self.read_preference_tags
                    .get_or_insert_with(Vec::new)
                    .push(tags);
            }
            other => {
                return Err(Error::invalid_argument(format!(
                    "{} is an invalid or unsupported connection string option",
                    other
                )))
            }
        }

        Ok(())
    }
}

fn percent_decode(s: &str, option: &str) -> Result<String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| {
            Error::invalid_argument(format!(
                "connection string {} could not be percent-decoded as UTF-8",
                option
            ))
        })
}

/// Contains the options that can be used to create a new
/// [`ClientSession`](../struct.ClientSession.html).
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct SessionOptions {
    /// The default options to use for transactions started on this session. Options passed to
    /// [`ClientSession::start_transaction`](crate::ClientSession::start_transaction) take
    /// precedence.
    pub default_transaction_options: Option<TransactionOptions>,
}

/// Contains the options that can be used for a transaction.
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct TransactionOptions {
    /// The selection criteria to use for all operations in the transaction. Inside a replica set
    /// this must be a primary read preference.
    pub selection_criteria: Option<SelectionCriteria>,

    /// The maximum amount of time to allow a single commitTransaction to run. Sent to the server
    /// as `maxTimeMS`.
    pub max_commit_time: Option<Duration>,
}

impl TransactionOptions {
    /// Fills any unset field from `defaults`.
    pub(crate) fn merge(mut self, defaults: Option<&TransactionOptions>) -> Self {
        if let Some(defaults) = defaults {
            if self.selection_criteria.is_none() {
                self.selection_criteria = defaults.selection_criteria.clone();
            }
            if self.max_commit_time.is_none() {
                self.max_commit_time = defaults.max_commit_time;
            }
        }
        self
    }
}
