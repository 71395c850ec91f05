//! Prompt templates for the classifier, generator and synthesizer.

mod template;

pub use template::PromptTemplate;
