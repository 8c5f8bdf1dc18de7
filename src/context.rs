//! Process-wide runtime context.
//!
//! A [`RuntimeContext`] is built once at start-up and cloned into every farmer
//! thread. It carries the only state shared between threads: the TLS client
//! configuration and the report output sink.

use crate::defaults;
use crate::error::Result;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared, line-serialized destination for report output.
///
/// Every farmer thread writes through the same mutex so that lines from
/// concurrent reporters never interleave.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// An in-memory sink, returned together with a handle to its contents.
    pub fn memory() -> (Self, CapturedOutput) {
        let buffer = CapturedOutput::default();
        (Self::new(Box::new(buffer.clone())), buffer)
    }

    /// Write a single line.
    pub fn line(&self, line: impl fmt::Display) -> io::Result<()> {
        let mut writer = self.inner.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()
    }

    /// Write several lines without letting another thread in between.
    pub fn block<I, L>(&self, lines: I) -> io::Result<()>
    where
        I: IntoIterator<Item = L>,
        L: fmt::Display,
    {
        let mut writer = self.inner.lock();
        for line in lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}

/// Handle to the bytes written into an [`OutputSink::memory`] sink.
#[derive(Clone, Default)]
pub struct CapturedOutput {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Client-side TLS configuration, built once per process.
///
/// Server certificates are accepted without chain or name validation; only
/// the handshake signatures are checked. Load tests routinely target hosts
/// with self-signed certificates.
#[derive(Clone)]
pub struct TlsEngine {
    config: Arc<ClientConfig>,
}

impl TlsEngine {
    pub fn new() -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_no_client_auth();

        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }
}

impl fmt::Debug for TlsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsEngine").finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Everything a farmer thread needs besides the configuration tree.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    tls: TlsEngine,
    output: OutputSink,
    socket_timeout: Duration,
    exit_on_fatal: bool,
    seed: Option<u64>,
    rng_sequence: Arc<AtomicU64>,
}

impl RuntimeContext {
    /// Build a context writing reports to `output`.
    ///
    /// Fatal errors are returned to the caller; the binary opts into
    /// terminating the process with [`RuntimeContext::with_exit_on_fatal`].
    pub fn new(output: OutputSink) -> Result<Self> {
        Ok(Self {
            tls: TlsEngine::new()?,
            output,
            socket_timeout: defaults::SOCKET_TIMEOUT,
            exit_on_fatal: false,
            seed: None,
            rng_sequence: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    pub fn with_exit_on_fatal(mut self, exit: bool) -> Self {
        self.exit_on_fatal = exit;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn tls(&self) -> &TlsEngine {
        &self.tls
    }

    pub fn output(&self) -> &OutputSink {
        &self.output
    }

    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout
    }

    pub fn exit_on_fatal(&self) -> bool {
        self.exit_on_fatal
    }

    /// A fresh generator for one profile run.
    ///
    /// With a configured seed each call derives a distinct but reproducible
    /// stream; without one the generator is seeded from the OS.
    pub fn profile_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => {
                let run = self.rng_sequence.fetch_add(1, Ordering::Relaxed);
                StdRng::seed_from_u64(seed.wrapping_add(run.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
            }
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_memory_sink_collects_lines() {
        let (sink, captured) = OutputSink::memory();
        sink.line("first").unwrap();
        sink.block(["a", "b"]).unwrap();
        assert_eq!(captured.lines(), vec!["first", "a", "b"]);
    }

    #[test]
    fn test_seeded_rngs_are_reproducible() {
        let (sink, _) = OutputSink::memory();
        let a = RuntimeContext::new(sink.clone()).unwrap().with_seed(Some(11));
        let b = RuntimeContext::new(sink).unwrap().with_seed(Some(11));
        let x: u64 = a.profile_rng().gen();
        let y: u64 = b.profile_rng().gen();
        assert_eq!(x, y);
        let z: u64 = a.profile_rng().gen();
        assert_ne!(x, z);
    }

    #[test]
    fn test_defaults() {
        let (sink, _) = OutputSink::memory();
        let ctx = RuntimeContext::new(sink).unwrap();
        assert_eq!(ctx.socket_timeout(), defaults::SOCKET_TIMEOUT);
        assert!(!ctx.exit_on_fatal());
    }
}
