//! Transport channel enforcement.

use crate::chain::{ChainFilter, ChannelFilter, ChannelRule, PortMapper};
use crate::config::SecurityConfig;
use crate::error::CompileError;
use crate::matcher::{parse_method, PathMatcher};
use crate::order::{FilterSlot, Placement};
use crate::resolver::Resolver;
use crate::wirers::{Contribution, FeatureWirer};

/// Wires the channel stage when any intercept rule declares `requires_channel`.
///
/// Channel rules are compiled in declaration order; at request time the first match
/// decides. Port mappings come from the chain configuration, falling back to the
/// standard pairs.
pub struct ChannelWirer;

impl FeatureWirer for ChannelWirer {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn applies(&self, config: &SecurityConfig) -> bool {
        config
            .intercept_urls
            .iter()
            .any(|u| u.requires_channel.is_some())
    }

    fn wire(
        &self,
        config: &SecurityConfig,
        _resolver: &Resolver,
    ) -> Result<Contribution, CompileError> {
        let mut rules = Vec::new();
        for url in &config.intercept_urls {
            let Some(channel) = url.requires_channel else {
                continue;
            };
            let matcher =
                PathMatcher::compile(&url.pattern, config.path_type, config.case_sensitive)?;
            let method = url.method.as_deref().map(parse_method).transpose()?;
            rules.push(ChannelRule {
                matcher,
                method,
                channel,
            });
        }

        let port_mapper = PortMapper::with_mappings(
            config
                .port_mappings
                .iter()
                .map(|m| (m.http, m.https))
                .collect(),
        );

        Ok(Contribution::default().filter(
            ChainFilter::Channel(ChannelFilter { rules, port_mapper }),
            Placement::Slot(FilterSlot::Channel),
        ))
    }
}
