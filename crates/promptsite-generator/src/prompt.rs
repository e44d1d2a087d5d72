//! Backend instructions for each artifact kind.

use promptsite_core::ArtifactKind;

/// Build the backend prompt for `kind` about `topic`.
#[must_use]
pub fn prompt_for(kind: ArtifactKind, topic: &str) -> String {
    match kind {
        ArtifactKind::Markup => markup_prompt(topic),
        ArtifactKind::Style => style_prompt(topic),
        ArtifactKind::Script => script_prompt(topic),
    }
}

fn markup_prompt(topic: &str) -> String {
    format!(
        r#"Create only the FULL HTML5 page for: {topic}.
Requirements:
- Include Bootstrap 5 via CDN.
- Link to "style.css" and "script.js".
- Use semantic sections: header, hero, main, footer, and write real, detailed content for the requested website.
- Do NOT include CSS or JS in the page.
- Keep consistent spacing between elements.
- If a clone of an existing website is requested, reproduce its layout, colors, sections and sample content as closely as possible.
- Add every feature the user asks for. A portfolio, for example, needs a photo, a large animated name, a short bio, experience cards, projects with images and descriptions, an FAQ with 3-4 entries and a contact box with name, email and phone.
- Use <img> tags with absolute https URLs wherever a picture belongs.
Respond ONLY with HTML code. Nothing else."#
    )
}

fn style_prompt(topic: &str) -> String {
    format!(
        r#"Write only CSS code for styling the {topic} website.
Requirements:
- Modern, professional theme with harmonious color combinations and gradients instead of plain solid colors.
- Use a Google Font such as 'Poppins'.
- Smooth animations, hover effects and transitions: scale, tilt, flip, slide, fade and blur on cards; fade, slide, typing and gradient effects on text.
- Highlight important headings and give the site a visible name.
- Animated or gradient backgrounds.
- Responsive design with consistent spacing, mostly centered unless the user asks otherwise.
- For clones, match the original fonts, colors and backgrounds exactly.
- If the user asks for a number of cards, style exactly that many; otherwise at least 4.
Do NOT include <style> tags or any HTML/JS.
Respond ONLY with CSS."#
    )
}

fn script_prompt(topic: &str) -> String {
    format!(
        r#"Write only vanilla JavaScript for interactivity on the {topic} website.
Features:
- Navbar toggle on mobile.
- Smooth scroll for anchor links.
- Button click ripple or highlight effect.
- Any further animations and interactions the website needs.
Do NOT include <script> tags or any HTML/CSS.
Respond ONLY with pure JavaScript."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_embed_topic() {
        for kind in ArtifactKind::ALL {
            assert!(prompt_for(kind, "vegan bakery").contains("vegan bakery"));
        }
    }

    #[test]
    fn test_prompts_are_distinct_roles() {
        let markup = prompt_for(ArtifactKind::Markup, "blog");
        let style = prompt_for(ArtifactKind::Style, "blog");
        let script = prompt_for(ArtifactKind::Script, "blog");

        assert!(markup.contains("style.css") && markup.contains("script.js"));
        assert!(style.contains("Respond ONLY with CSS"));
        assert!(script.contains("vanilla JavaScript"));
        assert_ne!(markup, style);
        assert_ne!(style, script);
    }
}
