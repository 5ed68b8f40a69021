use crate::error::ClientError;
use url::Url;

pub const HOSTS_PATH: &str = "api/hosts";
pub const IMPORT_PATH: &str = "api/import";
pub const MONITOR_PATH: &str = "api/ws/monitor";

/// Every URL the dashboard talks to, resolved from one base.
///
/// The push URL is derived with structured parsing: `http` maps to `ws`,
/// `https` to `wss`, and host, explicit port and path prefix are kept. An
/// explicit push base may be configured instead; it goes through the same
/// path joining.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    api_base: Url,
    hosts: Url,
    import: Url,
    push: Url,
}

impl Endpoints {
    pub fn resolve(api_url: &str, push_url: Option<&str>) -> Result<Self, ClientError> {
        let api_base = as_base(Url::parse(api_url.trim())?);
        if !matches!(api_base.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "api url must be http or https, got {}",
                api_base.scheme()
            )));
        }

        let push_base = match push_url.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => {
                let url = as_base(Url::parse(raw)?);
                if !matches!(url.scheme(), "ws" | "wss") {
                    return Err(ClientError::Config(format!(
                        "push url must be ws or wss, got {}",
                        url.scheme()
                    )));
                }
                url
            }
            None => derive_push_base(&api_base)?,
        };

        Ok(Self {
            hosts: api_base.join(HOSTS_PATH)?,
            import: api_base.join(IMPORT_PATH)?,
            push: push_base.join(MONITOR_PATH)?,
            api_base,
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub fn hosts(&self) -> &Url {
        &self.hosts
    }

    pub fn import(&self) -> &Url {
        &self.import
    }

    pub fn push(&self) -> &Url {
        &self.push
    }
}

// Relative joins replace the last segment unless the path ends with a slash.
fn as_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    url
}

fn derive_push_base(api_base: &Url) -> Result<Url, ClientError> {
    let scheme = match api_base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(ClientError::Config(format!(
                "cannot derive push url from {other} scheme"
            )));
        }
    };

    let mut push = api_base.clone();
    push.set_scheme(scheme).map_err(|_| {
        ClientError::Config(format!("cannot switch {api_base} to the {scheme} scheme"))
    })?;
    Ok(push)
}
