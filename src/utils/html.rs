use crate::models::question::ContentLayer;

/// Cleans question text layers with ammonia's whitelist.
///
/// Safe formatting tags like <b> and <p> survive. Scripts and event handlers are stripped.
pub fn sanitize_layers(layers: Vec<ContentLayer>) -> Vec<ContentLayer> {
    layers
        .into_iter()
        .map(|layer| match layer {
            ContentLayer::Text { text } => ContentLayer::Text {
                text: ammonia::clean(&text),
            },
            ContentLayer::Image { url, alt } => ContentLayer::Image {
                url,
                alt: alt.map(|a| ammonia::clean_text(&a)),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_stripped() {
        let cleaned = sanitize_layers(vec![ContentLayer::Text {
            text: "<b>Solve</b><script>alert(1)</script>".into(),
        }]);
        assert_eq!(
            cleaned,
            vec![ContentLayer::Text {
                text: "<b>Solve</b>".into()
            }]
        );
    }
}
