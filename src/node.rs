use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use iroh::SecretKey;
use iroh::protocol::Router;
use iroh_blobs::{ALPN as BLOBS_ALPN, BlobsProtocol, store::fs::FsStore};
use iroh_docs::{ALPN as DOCS_ALPN, AuthorId, NamespaceId, protocol::Docs, sync::Entry};
use iroh_gossip::{ALPN as GOSSIP_ALPN, net::Gossip};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Local iroh node serving blobs, gossip and documents from one directory.
#[derive(Clone, Debug)]
pub struct IrohNode {
    router: Router,
    store: FsStore,
    path: PathBuf,
    docs: Docs,
}

impl IrohNode {
    /// Start a node persisting to `path`, reusing its keypair if one exists.
    pub async fn spawn(path: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&path).await?;

        let key = load_secret_key(&path.join("keypair")).await?;
        let endpoint = iroh::Endpoint::builder().secret_key(key).bind().await?;
        let gossip = Gossip::builder().spawn(endpoint.clone());
        let blobs = FsStore::load(&path).await?;
        let docs = Docs::persistent(path.clone())
            .spawn(endpoint.clone(), (*blobs).clone(), gossip.clone())
            .await?;
        let router = Router::builder(endpoint.clone())
            .accept(BLOBS_ALPN, BlobsProtocol::new(&blobs, None))
            .accept(GOSSIP_ALPN, gossip)
            .accept(DOCS_ALPN, docs.clone())
            .spawn();
        debug!(id = %endpoint.id(), path = %path.display(), "iroh node started");
        Ok(Self {
            router,
            docs,
            path,
            store: blobs,
        })
    }

    /// Author used to sign writes to `doc_id`.
    ///
    /// Saved next to the node so a restarted node keeps writing as the same
    /// author.
    pub async fn author_for(&self, doc_id: &NamespaceId) -> Result<AuthorId> {
        let author_path = self.path.join(format!("{doc_id}.author"));
        if author_path.exists() {
            let bytes = tokio::fs::read(&author_path).await?;
            let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                anyhow::anyhow!("Invalid author file, expected 32 bytes, got {}", bytes.len())
            })?;
            let author = iroh_docs::Author::from_bytes(&bytes);
            let id = author.id();
            self.docs.author_import(author).await?;
            Ok(id)
        } else {
            let id = self.docs.author_create().await?;
            let Some(author) = self.docs.author_export(id).await? else {
                return Err(anyhow::anyhow!("failed to export author"));
            };
            tokio::fs::write(author_path, author.to_bytes()).await?;
            Ok(id)
        }
    }

    /// Fetch an entry's content and decode it.
    pub async fn read_entry<T: DeserializeOwned>(&self, entry: &Entry) -> Result<T> {
        let bytes = self.store.blobs().get_bytes(entry.content_hash()).await?;
        Ok(postcard::from_bytes(&bytes)?)
    }

    pub fn endpoint(&self) -> &iroh::Endpoint {
        self.router.endpoint()
    }

    pub fn docs(&self) -> &Docs {
        &self.docs
    }

    pub async fn shutdown(self) -> Result<()> {
        self.router.shutdown().await?;
        Ok(())
    }
}

async fn load_secret_key(key_path: &Path) -> Result<SecretKey> {
    if key_path.exists() {
        let key_bytes = tokio::fs::read(key_path).await?;
        let key_bytes = key_bytes.get(..32).ok_or_else(|| {
            anyhow::anyhow!("keypair file '{}' is truncated", key_path.display())
        })?;
        return Ok(SecretKey::try_from(key_bytes)?);
    }

    let secret_key = SecretKey::generate(&mut rand::rng());
    let parent = key_path.parent().ok_or_else(|| {
        anyhow::anyhow!("no parent directory found for '{}'", key_path.display())
    })?;
    tokio::fs::create_dir_all(parent).await?;

    let (file, temp_path) = tempfile::NamedTempFile::new_in(parent)
        .context("unable to create tempfile")?
        .into_parts();
    let mut file = tokio::fs::File::from_std(file);
    file.write_all(&secret_key.to_bytes())
        .await
        .context("unable to write keyfile")?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(temp_path, key_path)
        .await
        .context("failed to rename keyfile")?;
    Ok(secret_key)
}
