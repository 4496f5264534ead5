use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use alloy::transports::http::Http;
use alloy::transports::layers::FallbackLayer;
use anyhow::{anyhow, Context, Result};
use std::num::NonZeroUsize;
use tower::ServiceBuilder;

/// Builds a provider over every RPC url, falling back between them.
///
/// With a wallet, the provider signs and fills outgoing transactions.
pub fn create_provider(rpcs: &[String], wallet: Option<EthereumWallet>) -> Result<DynProvider> {
    let active_transports =
        NonZeroUsize::new(rpcs.len()).ok_or_else(|| anyhow!("No RPC url configured"))?;
    let fallback_layer = FallbackLayer::default().with_active_transport_count(active_transports);

    let transports = rpcs
        .iter()
        .map(|url| {
            let parsed: Url = url
                .parse()
                .with_context(|| format!("Invalid RPC url: {}", url))?;
            Ok(Http::new(parsed))
        })
        .collect::<Result<Vec<_>>>()?;

    let transport = ServiceBuilder::new()
        .layer(fallback_layer)
        .service(transports);
    let client = RpcClient::builder().transport(transport, false);

    let provider = match wallet {
        Some(wallet) => ProviderBuilder::new()
            .wallet(wallet)
            .connect_client(client)
            .erased(),
        None => ProviderBuilder::new().connect_client(client).erased(),
    };
    Ok(provider)
}

/// Parses a hex private key into a wallet and its account address.
pub fn load_signer(private_key: &str) -> Result<(EthereumWallet, alloy::primitives::Address)> {
    let signer: PrivateKeySigner = private_key
        .trim()
        .parse()
        .context("Invalid private key")?;
    let account = signer.address();
    Ok((EthereumWallet::from(signer), account))
}
