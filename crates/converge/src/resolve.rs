//! Principal lookup from the command line

use clap::Args;
use converge_core::{Gateway, Principal, Reference, Resolver};
use std::sync::Arc;

/// Exactly one way of naming a principal
#[derive(Debug, Default, Args)]
pub struct Selector {
    /// Graph subject descriptor
    #[arg(long)]
    pub descriptor: Option<String>,

    /// Group display name (needs --project-id)
    #[arg(long)]
    pub group: Option<String>,

    /// Project the group belongs to
    #[arg(long)]
    pub project_id: Option<String>,

    /// User principal name or `[org]\Group`
    #[arg(long)]
    pub principal_name: Option<String>,

    /// Origin directory, e.g. aad (needs --origin-id)
    #[arg(long)]
    pub origin: Option<String>,

    /// Identifier in the origin directory
    #[arg(long)]
    pub origin_id: Option<String>,
}

impl Selector {
    pub fn into_reference(self) -> anyhow::Result<Reference> {
        let Selector {
            descriptor,
            group,
            project_id,
            principal_name,
            origin,
            origin_id,
        } = self;

        let mut found = Vec::new();
        if let Some(descriptor) = descriptor {
            found.push(Reference::Descriptor(descriptor));
        }
        match (group, project_id) {
            (Some(name), Some(project_id)) => {
                found.push(Reference::GroupName { name, project_id });
            }
            (Some(_), None) => anyhow::bail!("--group needs --project-id"),
            (None, Some(_)) => anyhow::bail!("--project-id is only used with --group"),
            (None, None) => {}
        }
        if let Some(name) = principal_name {
            found.push(Reference::PrincipalName(name));
        }
        match (origin, origin_id) {
            (Some(origin), Some(origin_id)) => {
                found.push(Reference::Origin { origin, origin_id });
            }
            (None, None) => {}
            _ => anyhow::bail!("--origin and --origin-id go together"),
        }

        match found.len() {
            0 => anyhow::bail!(
                "name a principal with --descriptor, --group, --principal-name or --origin"
            ),
            1 => Ok(found.remove(0)),
            _ => anyhow::bail!("name the principal one way only"),
        }
    }
}

pub async fn run<G: Gateway>(gateway: Arc<G>, reference: &Reference) -> anyhow::Result<Principal> {
    let principal = Resolver::new(gateway).resolve(reference).await?;
    tracing::info!(%reference, id = %principal.id, "Resolved principal");
    Ok(principal)
}
