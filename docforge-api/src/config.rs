use clap::Parser;
use docforge_core::ModelKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Server settings, read from flags with environment fallbacks.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "docforge-api",
    about = "Markdown to PDF conversion and image cleaning over HTTP",
    version
)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "DOCFORGE_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 16 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Inpainting model used by /clean-image (telea or diffusion)
    #[arg(long, env = "INPAINT_MODEL", default_value_t = ModelKind::Telea)]
    pub inpaint_model: ModelKind,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            max_upload_bytes: 16 * 1024 * 1024,
            inpaint_model: ModelKind::Telea,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["docforge-api"]).unwrap();
        assert_eq!(config.port, ServerConfig::default().port);
        assert_eq!(config.inpaint_model, ModelKind::Telea);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn test_flags_override() {
        let config = ServerConfig::try_parse_from([
            "docforge-api",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--inpaint-model",
            "diffusion",
            "--max-upload-bytes",
            "1024",
        ])
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.inpaint_model, ModelKind::Diffusion);
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_invalid_model_is_rejected() {
        assert!(ServerConfig::try_parse_from(["docforge-api", "--inpaint-model", "lama"]).is_err());
        assert!(ServerConfig::try_parse_from(["docforge-api", "--port", "99999"]).is_err());
    }
}
