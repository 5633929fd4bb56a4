//! Outbound endpoints and their per-send settings.

use super::{ContentType, Origin};
use crate::outbound::SettingFinder;
use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Identifier of the setting finder used when the builder names none.
pub const DEFAULT_SETTING_FINDER: &str = "env";

type Extractor = Arc<dyn Fn(&dyn SettingFinder, &(dyn Any + Send + Sync)) -> String + Send + Sync>;

fn erase<C, F>(extractor: F) -> Extractor
where
    C: Send + Sync + 'static,
    F: Fn(&dyn SettingFinder, &C) -> String + Send + Sync + 'static,
{
    Arc::new(
        move |finder: &dyn SettingFinder, content: &(dyn Any + Send + Sync)| {
            match content.downcast_ref::<C>() {
                Some(content) => extractor(finder, content),
                None => String::new(),
            }
        },
    )
}

// =============================================================================
// EndPoint
// =============================================================================

/// Named outbound binding for a content type.
///
/// Extractors are evaluated lazily, per outgoing content instance, by
/// [`EndPoint::evaluate`].
#[derive(Clone)]
pub struct EndPoint {
    name: String,
    content_type: ContentType,
    setting_finder: String,
    to: (Extractor, Extractor),
    reply_to: Option<(Extractor, Extractor)>,
    from: Option<Extractor>,
    origin: Origin,
}

impl EndPoint {
    pub fn builder<C: Send + Sync + 'static>(name: impl Into<String>) -> EndPointBuilder<C> {
        EndPointBuilder {
            name: name.into(),
            setting_finder: DEFAULT_SETTING_FINDER.to_string(),
            to: None,
            reply_to: None,
            from: None,
            _content: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Type identifier of the setting finder the extractors read from.
    pub fn setting_finder(&self) -> &str {
        &self.setting_finder
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: Origin) {
        self.origin = origin;
    }

    /// Materialize the destination for one content instance.
    pub fn evaluate(
        &self,
        finder: &dyn SettingFinder,
        content: &(dyn Any + Send + Sync),
    ) -> EndPointSetting {
        let (to_cs, to_path) = &self.to;
        let (reply_to_connection_string, reply_to_path) = match &self.reply_to {
            Some((cs, path)) => (cs(finder, content), path(finder, content)),
            None => (String::new(), String::new()),
        };

        let mut origin = self.origin.clone();
        if let Some(from) = &self.from {
            let name = from(finder, content);
            if !name.trim().is_empty() {
                origin.name = name;
            }
        }

        EndPointSetting {
            end_point: self.name.clone(),
            to_connection_string: to_cs(finder, content),
            to_path: to_path(finder, content),
            reply_to_connection_string,
            reply_to_path,
            origin,
        }
    }
}

impl fmt::Debug for EndPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndPoint")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("setting_finder", &self.setting_finder)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Staged construction of an [`EndPoint`] for content `C`.
pub struct EndPointBuilder<C> {
    name: String,
    setting_finder: String,
    to: Option<(Extractor, Extractor)>,
    reply_to: Option<(Extractor, Extractor)>,
    from: Option<Extractor>,
    _content: PhantomData<fn(&C)>,
}

impl<C: Send + Sync + 'static> EndPointBuilder<C> {
    /// Read extractor values through the finder registered as `identifier`.
    pub fn using_finder(mut self, identifier: impl Into<String>) -> Self {
        self.setting_finder = identifier.into();
        self
    }

    pub fn to<F, G>(mut self, connection_string: F, path: G) -> Self
    where
        F: Fn(&dyn SettingFinder, &C) -> String + Send + Sync + 'static,
        G: Fn(&dyn SettingFinder, &C) -> String + Send + Sync + 'static,
    {
        self.to = Some((erase(connection_string), erase(path)));
        self
    }

    pub fn reply_to<F, G>(mut self, connection_string: F, path: G) -> Self
    where
        F: Fn(&dyn SettingFinder, &C) -> String + Send + Sync + 'static,
        G: Fn(&dyn SettingFinder, &C) -> String + Send + Sync + 'static,
    {
        self.reply_to = Some((erase(connection_string), erase(path)));
        self
    }

    /// Override the origin name per content instance.
    pub fn from<F>(mut self, name: F) -> Self
    where
        F: Fn(&dyn SettingFinder, &C) -> String + Send + Sync + 'static,
    {
        self.from = Some(erase(name));
        self
    }

    pub fn build(self) -> Result<EndPoint> {
        let to = self.to.ok_or_else(|| {
            Error::validation(format!(
                "EndPoint '{}' for {} has no destination extractors",
                self.name,
                std::any::type_name::<C>()
            ))
        })?;
        if self.setting_finder.trim().is_empty() {
            return Err(Error::validation(format!(
                "EndPoint '{}' has an empty setting finder identifier",
                self.name
            )));
        }

        Ok(EndPoint {
            name: self.name,
            content_type: ContentType::of::<C>(),
            setting_finder: self.setting_finder,
            to,
            reply_to: self.reply_to,
            from: self.from,
            origin: Origin::default(),
        })
    }
}

impl<C> fmt::Debug for EndPointBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndPointBuilder")
            .field("name", &self.name)
            .field("setting_finder", &self.setting_finder)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// EndPointSetting
// =============================================================================

/// Concrete destination of one send, produced by [`EndPoint::evaluate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPointSetting {
    /// Name of the endpoint this setting came from (empty when built by hand).
    pub end_point: String,
    pub to_connection_string: String,
    pub to_path: String,
    pub reply_to_connection_string: String,
    pub reply_to_path: String,
    pub origin: Origin,
}

impl EndPointSetting {
    pub fn new(to_connection_string: impl Into<String>, to_path: impl Into<String>) -> Self {
        Self {
            to_connection_string: to_connection_string.into(),
            to_path: to_path.into(),
            ..Self::default()
        }
    }

    pub fn has_destination(&self) -> bool {
        !self.to_connection_string.trim().is_empty() && !self.to_path.trim().is_empty()
    }
}
