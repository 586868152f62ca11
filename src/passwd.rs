//! Passphrase callback bridge.
//!
//! OpenSSL asks for a passphrase through a `pem_password_cb`: it hands over a
//! buffer of `max_len` bytes and a flag saying whether the passphrase will be
//! used to encrypt (write) or decrypt (read). [`PassphraseBridge`] answers it
//! from one of three sources, in order:
//!
//! 1. a static password supplied by the caller;
//! 2. a host [`PassphraseProvider`], asked repeatedly until it returns a
//!    passphrase of acceptable length;
//! 3. the console, the way OpenSSL's own default callback prompts.
//!
//! A provider that raises is never retried: the failure is reported at once
//! instead of being mistaken for a passphrase of the wrong length.
//!
//! # Example
//! ```no_run
//! # use ossl_bridge::configs::PassphraseConfig;
//! # use ossl_bridge::passwd::PassphraseBridge;
//! let config = PassphraseConfig::default();
//! let provider = |for_encryption: bool| anyhow::Ok(if for_encryption { "new secret" } else { "old secret" });
//! let bridge = PassphraseBridge::new(&config).provider(&provider);
//!
//! let mut buf = [0u8; 1024];
//! let len = bridge.fill(&mut buf, false).unwrap();
//! assert_eq!(&buf[..len], b"old secret");
//! ```

use std::ffi::c_int;
use std::fmt;
use std::io;

use secrecy::{ExposeSecret, SecretVec};
use thiserror::Error;

use crate::configs::PassphraseConfig;
use crate::protect::{protect, ProtectError};

const PROMPT: &str = "Enter PEM pass phrase:";
const VERIFY_PROMPT: &str = "Verifying - Enter PEM pass phrase:";

/// Passphrase bytes, wiped from memory on drop.
pub struct Passphrase(SecretVec<u8>);

impl Passphrase {
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl From<Vec<u8>> for Passphrase {
    fn from(bytes: Vec<u8>) -> Self {
        Passphrase(SecretVec::new(bytes))
    }
}

impl From<&[u8]> for Passphrase {
    fn from(bytes: &[u8]) -> Self {
        bytes.to_vec().into()
    }
}

impl From<String> for Passphrase {
    fn from(s: String) -> Self {
        s.into_bytes().into()
    }
}

impl From<&str> for Passphrase {
    fn from(s: &str) -> Self {
        s.as_bytes().into()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase([REDACTED {} bytes])", self.len())
    }
}

/// Host closure asked for a passphrase.
///
/// `for_encryption` is true when the passphrase will protect new data, so a
/// provider can ask for confirmation only then.
pub trait PassphraseProvider {
    fn provide_passphrase(&self, for_encryption: bool) -> anyhow::Result<Passphrase>;
}

impl<F, P> PassphraseProvider for F
where
    F: Fn(bool) -> anyhow::Result<P>,
    P: Into<Passphrase>,
{
    fn provide_passphrase(&self, for_encryption: bool) -> anyhow::Result<Passphrase> {
        self(for_encryption).map(Into::into)
    }
}

#[derive(Debug, Error)]
pub enum PasswdError {
    /// The provider returned an error or panicked.
    #[error("passphrase callback raised: {0}")]
    Raised(#[source] ProtectError),

    #[error("no acceptable passphrase after {0} attempts")]
    TooManyAttempts(u32),

    #[error("could not read passphrase from the console: {0}")]
    Prompt(#[source] io::Error),

    #[error("passphrases do not match")]
    Mismatch,
}

type Prompter = Box<dyn Fn(&str) -> io::Result<String> + Send + Sync>;

fn console_prompt(message: &str) -> io::Result<String> {
    rpassword::prompt_password(format!("{} ", message))
}

/// Answers OpenSSL's passphrase requests.
pub struct PassphraseBridge<'a> {
    min_len: usize,
    max_attempts: Option<u32>,
    static_password: Option<Passphrase>,
    provider: Option<&'a dyn PassphraseProvider>,
    prompt: Prompter,
}

impl<'a> PassphraseBridge<'a> {
    pub fn new(config: &PassphraseConfig) -> Self {
        Self {
            min_len: config.min_len,
            max_attempts: config.max_attempts,
            static_password: None,
            provider: None,
            prompt: Box::new(console_prompt),
        }
    }

    /// Use `password` as is; providers and the console are never consulted.
    pub fn static_password(mut self, password: impl Into<Passphrase>) -> Self {
        self.static_password = Some(password.into());
        self
    }

    pub fn provider(mut self, provider: &'a dyn PassphraseProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the console prompt used when there is no other source.
    pub fn prompt_with<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&str) -> io::Result<String> + Send + Sync + 'static,
    {
        self.prompt = Box::new(prompt);
        self
    }

    /// Write a passphrase into `buf` and return its length.
    ///
    /// `buf.len()` is the longest passphrase OpenSSL accepts. Nothing past the
    /// returned length is written.
    pub fn fill(&self, buf: &mut [u8], for_encryption: bool) -> Result<usize, PasswdError> {
        let provider = match (&self.static_password, self.provider) {
            (None, Some(provider)) => provider,
            _ => return self.default_passwd_cb(buf, for_encryption),
        };

        let max_len = buf.len();
        let mut attempts = 0;
        loop {
            self.next_attempt(&mut attempts)?;
            let pass = protect(|| provider.provide_passphrase(for_encryption))
                .map_err(PasswdError::Raised)?;

            if pass.len() < self.min_len {
                tracing::warn!(attempt = attempts, "password must be at least {} bytes", self.min_len);
                continue;
            }
            if pass.len() > max_len {
                tracing::warn!(attempt = attempts, "password must be at most {} bytes", max_len);
                continue;
            }

            let len = pass.len();
            buf[..len].copy_from_slice(pass.expose());
            return Ok(len);
        }
    }

    /// `pem_password_cb` calling convention: the length written, or -1.
    pub fn pem_passwd_cb(&self, buf: &mut [u8], rwflag: c_int) -> c_int {
        match self.fill(buf, rwflag != 0) {
            Ok(len) => c_int::try_from(len).unwrap_or(-1),
            Err(err) => {
                tracing::debug!(error = %err, "passphrase callback failed");
                -1
            }
        }
    }

    /// OpenSSL's default behavior: copy the static password, else prompt.
    ///
    /// The console passphrase must meet the minimum length only when it will
    /// be used for encryption, and is then asked for twice.
    fn default_passwd_cb(&self, buf: &mut [u8], for_encryption: bool) -> Result<usize, PasswdError> {
        if let Some(pass) = &self.static_password {
            let len = pass.len().min(buf.len());
            buf[..len].copy_from_slice(&pass.expose()[..len]);
            return Ok(len);
        }

        let min_len = if for_encryption { self.min_len } else { 0 };
        let mut attempts = 0;
        loop {
            self.next_attempt(&mut attempts)?;
            let pass = Passphrase::from((self.prompt)(PROMPT).map_err(PasswdError::Prompt)?);
            if pass.len() < min_len || pass.len() > buf.len() {
                tracing::warn!(attempt = attempts, "password must be {} to {} bytes", min_len, buf.len());
                continue;
            }

            if for_encryption {
                let again = Passphrase::from((self.prompt)(VERIFY_PROMPT).map_err(PasswdError::Prompt)?);
                if again.expose() != pass.expose() {
                    return Err(PasswdError::Mismatch);
                }
            }

            let len = pass.len();
            buf[..len].copy_from_slice(pass.expose());
            return Ok(len);
        }
    }

    fn next_attempt(&self, attempts: &mut u32) -> Result<(), PasswdError> {
        if let Some(max) = self.max_attempts {
            if *attempts >= max {
                return Err(PasswdError::TooManyAttempts(*attempts));
            }
        }
        *attempts += 1;
        Ok(())
    }
}

impl fmt::Debug for PassphraseBridge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassphraseBridge")
            .field("min_len", &self.min_len)
            .field("max_attempts", &self.max_attempts)
            .field("static_password", &self.static_password.is_some())
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Provider answering from a fixed script, recording every flag it saw.
    struct Scripted {
        answers: Mutex<VecDeque<&'static str>>,
        calls: Mutex<Vec<bool>>,
    }

    impl Scripted {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().copied().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<bool> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PassphraseProvider for Scripted {
        fn provide_passphrase(&self, for_encryption: bool) -> anyhow::Result<Passphrase> {
            self.calls.lock().unwrap().push(for_encryption);
            let next = self.answers.lock().unwrap().pop_front();
            next.map(Passphrase::from).ok_or_else(|| anyhow!("script exhausted"))
        }
    }

    fn no_console(_: &str) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::Other, "console not available"))
    }

    #[test]
    fn test_short_password_is_retried() {
        let provider = Scripted::new(&["abc", "abcd"]);
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).provider(&provider);

        let mut buf = [0u8; 16];
        assert_eq!(bridge.fill(&mut buf, false).unwrap(), 4);
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(provider.calls(), vec![false, false]);
    }

    #[test]
    fn test_long_password_is_retried() {
        let provider = Scripted::new(&["much too long", "fits"]);
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).provider(&provider);

        let mut buf = [0u8; 8];
        assert_eq!(bridge.fill(&mut buf, true).unwrap(), 4);
        assert_eq!(provider.calls(), vec![true, true]);
    }

    #[test]
    fn test_exact_max_len_fills_buffer() {
        let provider = Scripted::new(&["12345678"]);
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).provider(&provider);

        let mut buf = [0xffu8; 9];
        assert_eq!(bridge.fill(&mut buf[..8], false).unwrap(), 8);
        assert_eq!(&buf[..8], b"12345678");
        assert_eq!(buf[8], 0xff);
    }

    #[test]
    fn test_raising_provider_is_not_retried() {
        let provider = Scripted::new(&[]);
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).provider(&provider);

        let mut buf = [0u8; 16];
        assert_eq!(bridge.pem_passwd_cb(&mut buf, 0), -1);
        assert_eq!(provider.calls().len(), 1);
    }

    #[test]
    fn test_panicking_provider_reports_failure() {
        let provider = |_: bool| -> anyhow::Result<&'static str> { panic!("provider crashed") };
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).provider(&provider);

        let mut buf = [0u8; 16];
        let err = bridge.fill(&mut buf, false).unwrap_err();
        assert!(matches!(err, PasswdError::Raised(ProtectError::Panicked(_))));
    }

    #[test]
    fn test_closure_provider() {
        let provider = |for_encryption: bool| anyhow::Ok(if for_encryption { "write-pass" } else { "read-pass" });
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).provider(&provider);

        let mut buf = [0u8; 32];
        let len = bridge.pem_passwd_cb(&mut buf, 1);
        assert_eq!(&buf[..len as usize], b"write-pass");
        let len = bridge.pem_passwd_cb(&mut buf, 0);
        assert_eq!(&buf[..len as usize], b"read-pass");
    }

    #[test]
    fn test_max_attempts_bounds_retries() {
        let config = PassphraseConfig {
            min_len: 4,
            max_attempts: Some(2),
        };
        let provider = Scripted::new(&["a", "b", "valid"]);
        let bridge = PassphraseBridge::new(&config).provider(&provider);

        let mut buf = [0u8; 16];
        let err = bridge.fill(&mut buf, false).unwrap_err();
        assert!(matches!(err, PasswdError::TooManyAttempts(2)));
        assert_eq!(provider.calls().len(), 2);
    }

    #[test]
    fn test_static_password_wins_over_provider() {
        let provider = Scripted::new(&["from provider"]);
        let bridge = PassphraseBridge::new(&PassphraseConfig::default())
            .static_password("static secret")
            .provider(&provider)
            .prompt_with(no_console);

        let mut buf = [0u8; 6];
        assert_eq!(bridge.fill(&mut buf, false).unwrap(), 6);
        assert_eq!(&buf, b"static");
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn test_console_prompt_confirms_when_encrypting() {
        let answers = Mutex::new(VecDeque::from(vec!["pw", "secret", "secret"]));
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).prompt_with(move |_| {
            Ok(answers.lock().unwrap().pop_front().unwrap_or_default().to_string())
        });

        let mut buf = [0u8; 32];
        assert_eq!(bridge.fill(&mut buf, true).unwrap(), 6);
        assert_eq!(&buf[..6], b"secret");
    }

    #[test]
    fn test_console_prompt_retries_bad_length() {
        let asked = Arc::new(Mutex::new(Vec::new()));
        let record = asked.clone();
        let answers = Mutex::new(VecDeque::from(vec!["far too long for the buffer", "fits"]));
        let config = PassphraseConfig {
            min_len: 4,
            max_attempts: Some(2),
        };
        let bridge = PassphraseBridge::new(&config).prompt_with(move |message| {
            record.lock().unwrap().push(message.to_string());
            Ok(answers.lock().unwrap().pop_front().unwrap_or_default().to_string())
        });

        let mut buf = [0u8; 8];
        assert_eq!(bridge.fill(&mut buf, false).unwrap(), 4);
        assert_eq!(&buf[..4], b"fits");
        assert_eq!(*asked.lock().unwrap(), vec![PROMPT; 2]);
    }

    #[test]
    fn test_console_prompt_enforces_min_len_when_encrypting() {
        let answers = Mutex::new(VecDeque::from(vec!["abc", "abcd", "abcd"]));
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).prompt_with(move |_| {
            Ok(answers.lock().unwrap().pop_front().unwrap_or_default().to_string())
        });

        let mut buf = [0u8; 16];
        assert_eq!(bridge.fill(&mut buf, true).unwrap(), 4);
        assert_eq!(&buf[..4], b"abcd");
    }

    #[test]
    fn test_console_prompt_mismatch() {
        let answers = Mutex::new(VecDeque::from(vec!["secret", "sekret"]));
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).prompt_with(move |_| {
            Ok(answers.lock().unwrap().pop_front().unwrap_or_default().to_string())
        });

        let mut buf = [0u8; 32];
        assert!(matches!(bridge.fill(&mut buf, true), Err(PasswdError::Mismatch)));
    }

    #[test]
    fn test_console_failure_is_reported() {
        let bridge = PassphraseBridge::new(&PassphraseConfig::default()).prompt_with(no_console);
        let mut buf = [0u8; 32];
        assert!(matches!(bridge.fill(&mut buf, false), Err(PasswdError::Prompt(_))));
        assert_eq!(bridge.pem_passwd_cb(&mut buf, 0), -1);
    }

    #[test]
    fn test_passphrase_debug_is_redacted() {
        let pass = Passphrase::from("hunter22");
        assert_eq!(format!("{:?}", pass), "Passphrase([REDACTED 8 bytes])");
    }
}
