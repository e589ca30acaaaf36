//! Class names mentioned by descriptors and generic signatures.
//!
//! Descriptors (`(ILa/B;)[La/C;`) and generic signatures (`<T:La/B;>La/C<TT;>.D;`) both name
//! classes, and a kept declaration needs every in-module class it mentions to survive as well.
//! A single recursive descent scanner accepts both grammars (JVMS 4.3 and 4.7.9.1).
//!
//! Inner classes written with the signature suffix syntax (`La/C<TT;>.D;`) are reported under
//! their binary name (`a/C$D`) in addition to the outer class.

use crate::Result;

/// Collect every class named by a field descriptor, method descriptor or generic signature, in
/// order of appearance.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `text` follows neither grammar.
///
/// # Examples
/// ```rust
/// use abiscope::classfile::descriptor::referenced_classes;
///
/// let classes = referenced_classes("(La/B;[La/C;I)Ljava/util/List;")?;
/// assert_eq!(classes, ["a/B", "a/C", "java/util/List"]);
/// # Ok::<(), abiscope::Error>(())
/// ```
pub fn referenced_classes(text: &str) -> Result<Vec<String>> {
    let mut scanner = Scanner {
        text: text.as_bytes(),
        pos: 0,
        found: Vec::new(),
    };
    scanner.signature()?;
    Ok(scanner.found)
}

/// The class behind a `CONSTANT_Class` name.
///
/// Array classes (`[[La/B;`) name their element class; primitive arrays name no class at all.
#[must_use]
pub fn element_class(name: &str) -> Option<String> {
    if name.starts_with('[') {
        referenced_classes(name)
            .ok()
            .and_then(|classes| classes.into_iter().next())
    } else {
        Some(name.to_string())
    }
}

struct Scanner<'a> {
    text: &'a [u8],
    pos: usize,
    found: Vec<String>,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn error(&self) -> crate::Error {
        malformed_error!(
            "Invalid descriptor or signature {:?} at {}",
            String::from_utf8_lossy(self.text),
            self.pos
        )
    }

    fn identifier(&mut self, terminators: &[u8]) -> Result<String> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if terminators.contains(&byte) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start || self.peek().is_none() {
            return Err(self.error());
        }
        Ok(String::from_utf8_lossy(&self.text[start..self.pos]).into_owned())
    }

    fn signature(&mut self) -> Result<()> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }

        if self.peek() == Some(b'(') {
            self.pos += 1;
            while self.peek() != Some(b')') {
                self.java_type()?;
            }
            self.pos += 1;
            if self.peek() == Some(b'V') {
                self.pos += 1;
            } else {
                self.java_type()?;
            }
            while self.peek() == Some(b'^') {
                self.pos += 1;
                self.reference_type()?;
            }
            if self.pos != self.text.len() {
                return Err(self.error());
            }
            return Ok(());
        }

        if self.peek().is_none() {
            return Err(self.error());
        }
        while self.peek().is_some() {
            self.java_type()?;
        }
        Ok(())
    }

    fn type_parameters(&mut self) -> Result<()> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            self.identifier(b":")?;
            while self.peek() == Some(b':') {
                self.pos += 1;
                if matches!(self.peek(), Some(b'L' | b'T' | b'[')) {
                    self.reference_type()?;
                }
            }
        }
        self.expect(b'>')
    }

    fn java_type(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                self.pos += 1;
                Ok(())
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                self.pos += 1;
                self.identifier(b";")?;
                self.expect(b';')
            }
            Some(b'[') => {
                self.pos += 1;
                self.java_type()
            }
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> Result<()> {
        self.expect(b'L')?;
        let mut name = self.identifier(b"<;.")?;
        self.found.push(name.clone());

        loop {
            match self.peek() {
                Some(b'<') => self.type_arguments()?,
                Some(b'.') => {
                    self.pos += 1;
                    let inner = self.identifier(b"<;.")?;
                    name = format!("{name}${inner}");
                    self.found.push(name.clone());
                }
                Some(b';') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(self.error()),
            }
        }
    }

    fn type_arguments(&mut self) -> Result<()> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => self.pos += 1,
                Some(b'+' | b'-') => {
                    self.pos += 1;
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.expect(b'>')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_descriptors() {
        assert!(referenced_classes("I").unwrap().is_empty());
        assert_eq!(referenced_classes("[[La/B;").unwrap(), ["a/B"]);
        assert!(referenced_classes("La/B").is_err());
        assert!(referenced_classes("").is_err());
    }

    #[test]
    fn method_descriptors() {
        assert!(referenced_classes("()V").unwrap().is_empty());
        assert_eq!(
            referenced_classes("(JLa/B;D)La/C;").unwrap(),
            ["a/B", "a/C"]
        );
        assert!(referenced_classes("(I)").is_err());
        assert!(referenced_classes("(I)VV").is_err());
    }

    #[test]
    fn class_signature_with_bounds() {
        let classes =
            referenced_classes("<T:La/Bound;U::La/Iface;>La/Base<TT;>;La/Iface<-TU;*>;").unwrap();
        assert_eq!(classes, ["a/Bound", "a/Iface", "a/Base", "a/Iface"]);
    }

    #[test]
    fn method_signature_with_throws() {
        let classes =
            referenced_classes("<E:Ljava/lang/Exception;>(Ljava/util/List<+La/B;>;)TE;^TE;^La/Err;")
                .unwrap();
        assert_eq!(
            classes,
            ["java/lang/Exception", "java/util/List", "a/B", "a/Err"]
        );
    }

    #[test]
    fn inner_class_suffix() {
        let classes = referenced_classes("La/Outer<TT;>.Inner<La/X;>;").unwrap();
        assert_eq!(classes, ["a/Outer", "a/Outer$Inner", "a/X"]);
    }

    #[test]
    fn element_classes() {
        assert_eq!(element_class("a/B").as_deref(), Some("a/B"));
        assert_eq!(element_class("[[La/B;").as_deref(), Some("a/B"));
        assert_eq!(element_class("[I"), None);
    }
}
