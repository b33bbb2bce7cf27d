use std::fmt::Write as _;
use std::path::PathBuf;

/// Where the reverse-proxy site configuration comes from.
#[derive(Debug, Clone)]
pub enum SiteSource {
    /// A ready-made config file, copied verbatim.
    File(PathBuf),
    /// A config rendered from a typed description.
    Rendered(NginxSite),
}

/// Nginx server block proxying a public domain to a local backend.
///
/// # Example
///
/// ```
/// use ancora::NginxSite;
///
/// let site = NginxSite::new("alerts.example.com")
///     .upstream("127.0.0.1:5000")
///     .client_max_body_size("10m");
///
/// assert_eq!(site.server_name, "alerts.example.com");
/// assert!(site.render().contains("proxy_pass http://127.0.0.1:5000;"));
/// ```
#[derive(Debug, Clone)]
pub struct NginxSite {
    pub server_name: String,
    pub listen: u16,
    pub upstream: String,
    pub client_max_body_size: Option<String>,
    pub forwarded_headers: bool,
    pub extra_directives: Vec<String>,
}

impl NginxSite {
    #[must_use]
    pub fn new(server_name: &str) -> Self {
        Self {
            server_name: server_name.to_string(),
            listen: 80,
            upstream: "127.0.0.1:5000".to_string(),
            client_max_body_size: None,
            forwarded_headers: true,
            extra_directives: Vec::new(),
        }
    }

    #[must_use]
    pub const fn listen(mut self, port: u16) -> Self {
        self.listen = port;
        self
    }

    #[must_use]
    pub fn upstream(mut self, addr: &str) -> Self {
        self.upstream = addr.to_string();
        self
    }

    #[must_use]
    pub fn client_max_body_size(mut self, size: &str) -> Self {
        self.client_max_body_size = Some(size.to_string());
        self
    }

    #[must_use]
    pub const fn without_forwarded_headers(mut self) -> Self {
        self.forwarded_headers = false;
        self
    }

    /// Append a raw directive to the `location /` block. The
    /// trailing semicolon is added if missing.
    #[must_use]
    pub fn directive(mut self, raw: &str) -> Self {
        self.extra_directives.push(raw.to_string());
        self
    }

    /// Render the server block. Certbot's nginx plugin later adds
    /// the TLS listener to this same file.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "server {{");
        let _ = writeln!(out, "    listen {};", self.listen);
        let _ = writeln!(out, "    listen [::]:{};", self.listen);
        let _ = writeln!(out, "    server_name {};", self.server_name);
        if let Some(size) = &self.client_max_body_size {
            let _ = writeln!(out, "    client_max_body_size {size};");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "    location / {{");
        let _ = writeln!(out, "        proxy_pass http://{};", self.upstream);
        if self.forwarded_headers {
            let _ = writeln!(out, "        proxy_set_header Host $host;");
            let _ = writeln!(out, "        proxy_set_header X-Real-IP $remote_addr;");
            let _ = writeln!(
                out,
                "        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;"
            );
            let _ = writeln!(out, "        proxy_set_header X-Forwarded-Proto $scheme;");
        }
        for d in &self.extra_directives {
            let d = d.trim_end_matches(';');
            let _ = writeln!(out, "        {d};");
        }
        let _ = writeln!(out, "    }}");
        let _ = writeln!(out, "}}");
        out
    }
}
