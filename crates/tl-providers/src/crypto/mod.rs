//! Crypto providers.

mod aes;

pub use aes::AesGcmCryptoProvider;
