//! Dashboard metrics from the monitoring page

use super::{value_as_text, Collector};
use crate::models::{DashboardMetrics, Metric};
use crate::parser;
use crate::portal::heviton;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldStrategy {
    /// Read the rendered `.num` element through in-page script
    Script,
    /// Parse the page source for the same element
    Markup,
}

const METRIC_STRATEGIES: &[FieldStrategy] = &[FieldStrategy::Script, FieldStrategy::Markup];

fn value_selector(metric: Metric) -> String {
    format!(".{} .num", metric.scope_class())
}

impl Collector<'_> {
    /// Current power, today's, this month's and cumulative generation
    pub async fn dashboard(&self) -> DashboardMetrics {
        tracing::info!("Reading monitoring dashboard");
        let mut metrics = DashboardMetrics::default();

        if let Err(e) = self.visit(heviton::MONITORING_PAGE).await {
            tracing::warn!("Monitoring page unavailable: {}", e);
            return metrics;
        }
        self.waits.extra.settle().await;

        let mut source = None;
        for metric in Metric::ALL {
            let value = self.metric_value(metric, &mut source).await;
            if value.is_none() {
                tracing::debug!("{:?} not found on dashboard", metric);
            }
            metrics.set(metric, value);
        }

        if metrics.is_empty() {
            tracing::warn!("No dashboard metrics found on the monitoring page");
        } else {
            tracing::info!("Dashboard metrics: {:?}", metrics);
        }
        metrics
    }

    /// First value produced by the strategy chain. The page source is fetched at
    /// most once and shared across metrics.
    async fn metric_value(&self, metric: Metric, source: &mut Option<String>) -> Option<String> {
        let css = value_selector(metric);

        for strategy in METRIC_STRATEGIES {
            let value = match strategy {
                FieldStrategy::Script => {
                    let script = format!("return document.querySelector('{}')?.innerText;", css);
                    match self.browser.eval(&script).await {
                        Ok(v) => value_as_text(&v),
                        Err(e) => {
                            tracing::debug!("Script lookup for {} failed: {}", css, e);
                            None
                        }
                    }
                }
                FieldStrategy::Markup => {
                    if source.is_none() {
                        *source = self.browser.page_source().await.ok();
                    }
                    source.as_deref().and_then(|html| parser::text_of(html, &css))
                }
            };
            if value.is_some() {
                return value;
            }
        }
        None
    }
}
