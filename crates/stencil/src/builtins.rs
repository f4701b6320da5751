//
// builtins.rs
//
// Metadata for the expression language's built-in functions. The
// reference indexer matches unnamespaced call names against this table;
// the CLI uses the descriptions for usage summaries.
//

/// Signature metadata for one built-in function. `maximum_arguments` is
/// `None` for variadic functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub minimum_arguments: usize,
    pub maximum_arguments: Option<usize>,
    pub description: &'static str,
}

pub const BUILTIN_FUNCTIONS: &[BuiltinFunction] = &[
    BuiltinFunction { name: "add", minimum_arguments: 2, maximum_arguments: Some(2), description: "Returns the sum of the two provided integers." },
    BuiltinFunction { name: "and", minimum_arguments: 2, maximum_arguments: None, description: "Checks whether all argument values are true." },
    BuiltinFunction { name: "array", minimum_arguments: 1, maximum_arguments: Some(1), description: "Converts the value to an array." },
    BuiltinFunction { name: "base64", minimum_arguments: 1, maximum_arguments: Some(1), description: "Returns the base64 representation of the input string." },
    BuiltinFunction { name: "bool", minimum_arguments: 1, maximum_arguments: Some(1), description: "Converts the parameter to a boolean." },
    BuiltinFunction { name: "coalesce", minimum_arguments: 1, maximum_arguments: None, description: "Returns the first non-null value from the parameters." },
    BuiltinFunction { name: "concat", minimum_arguments: 0, maximum_arguments: None, description: "Combines multiple string or array values." },
    BuiltinFunction { name: "contains", minimum_arguments: 2, maximum_arguments: Some(2), description: "Checks whether an array, object, or string contains a value." },
    BuiltinFunction { name: "copyIndex", minimum_arguments: 0, maximum_arguments: Some(2), description: "Returns the index of a copy iteration loop." },
    BuiltinFunction { name: "createArray", minimum_arguments: 0, maximum_arguments: None, description: "Creates an array from the parameters." },
    BuiltinFunction { name: "deployment", minimum_arguments: 0, maximum_arguments: Some(0), description: "Returns information about the current deployment operation." },
    BuiltinFunction { name: "div", minimum_arguments: 2, maximum_arguments: Some(2), description: "Returns the integer division of the two provided integers." },
    BuiltinFunction { name: "empty", minimum_arguments: 1, maximum_arguments: Some(1), description: "Determines if an array, object, or string is empty." },
    BuiltinFunction { name: "endsWith", minimum_arguments: 2, maximum_arguments: Some(2), description: "Determines whether a string ends with a value." },
    BuiltinFunction { name: "equals", minimum_arguments: 2, maximum_arguments: Some(2), description: "Checks whether two values equal each other." },
    BuiltinFunction { name: "first", minimum_arguments: 1, maximum_arguments: Some(1), description: "Returns the first element of the array, or first character of the string." },
    BuiltinFunction { name: "format", minimum_arguments: 1, maximum_arguments: None, description: "Creates a formatted string from input values." },
    BuiltinFunction { name: "greater", minimum_arguments: 2, maximum_arguments: Some(2), description: "Checks whether the first value is greater than the second value." },
    BuiltinFunction { name: "guid", minimum_arguments: 1, maximum_arguments: None, description: "Creates a deterministic value in the format of a globally unique identifier." },
    BuiltinFunction { name: "if", minimum_arguments: 3, maximum_arguments: Some(3), description: "Returns a value based on whether a condition is true or false." },
    BuiltinFunction { name: "int", minimum_arguments: 1, maximum_arguments: Some(1), description: "Converts the specified value to an integer." },
    BuiltinFunction { name: "json", minimum_arguments: 1, maximum_arguments: Some(1), description: "Converts a valid JSON string into a JSON data type." },
    BuiltinFunction { name: "last", minimum_arguments: 1, maximum_arguments: Some(1), description: "Returns the last element of the array, or last character of the string." },
    BuiltinFunction { name: "length", minimum_arguments: 1, maximum_arguments: Some(1), description: "Returns the number of elements in an array or characters in a string." },
    BuiltinFunction { name: "less", minimum_arguments: 2, maximum_arguments: Some(2), description: "Checks whether the first value is less than the second value." },
    BuiltinFunction { name: "max", minimum_arguments: 1, maximum_arguments: None, description: "Returns the maximum value from an array of integers or a comma-separated list of integers." },
    BuiltinFunction { name: "min", minimum_arguments: 1, maximum_arguments: None, description: "Returns the minimum value from an array of integers or a comma-separated list of integers." },
    BuiltinFunction { name: "mod", minimum_arguments: 2, maximum_arguments: Some(2), description: "Returns the remainder of the integer division of the two provided integers." },
    BuiltinFunction { name: "mul", minimum_arguments: 2, maximum_arguments: Some(2), description: "Returns the multiplication of the two provided integers." },
    BuiltinFunction { name: "not", minimum_arguments: 1, maximum_arguments: Some(1), description: "Converts boolean value to its opposite value." },
    BuiltinFunction { name: "or", minimum_arguments: 2, maximum_arguments: None, description: "Checks whether any argument value is true." },
    BuiltinFunction { name: "parameters", minimum_arguments: 1, maximum_arguments: Some(1), description: "Returns a parameter value." },
    BuiltinFunction { name: "range", minimum_arguments: 2, maximum_arguments: Some(2), description: "Creates an array of integers from a starting integer." },
    BuiltinFunction { name: "reference", minimum_arguments: 1, maximum_arguments: Some(3), description: "Returns an object representing a resource's runtime state." },
    BuiltinFunction { name: "replace", minimum_arguments: 3, maximum_arguments: Some(3), description: "Returns a new string with all instances of one string replaced by another." },
    BuiltinFunction { name: "resourceGroup", minimum_arguments: 0, maximum_arguments: Some(0), description: "Returns an object that represents the current resource group." },
    BuiltinFunction { name: "resourceId", minimum_arguments: 2, maximum_arguments: None, description: "Returns the unique identifier of a resource." },
    BuiltinFunction { name: "skip", minimum_arguments: 2, maximum_arguments: Some(2), description: "Returns an array or string with the specified number of elements removed from the start." },
    BuiltinFunction { name: "split", minimum_arguments: 2, maximum_arguments: Some(2), description: "Returns an array of strings split by the specified delimiter." },
    BuiltinFunction { name: "startsWith", minimum_arguments: 2, maximum_arguments: Some(2), description: "Determines whether a string starts with a value." },
    BuiltinFunction { name: "string", minimum_arguments: 1, maximum_arguments: Some(1), description: "Converts the specified value to a string." },
    BuiltinFunction { name: "sub", minimum_arguments: 2, maximum_arguments: Some(2), description: "Returns the subtraction of the two provided integers." },
    BuiltinFunction { name: "subscription", minimum_arguments: 0, maximum_arguments: Some(0), description: "Returns details about the subscription for the current deployment." },
    BuiltinFunction { name: "substring", minimum_arguments: 1, maximum_arguments: Some(3), description: "Returns a substring that starts at the specified character position." },
    BuiltinFunction { name: "take", minimum_arguments: 2, maximum_arguments: Some(2), description: "Returns an array or string with the specified number of elements from the start." },
    BuiltinFunction { name: "toLower", minimum_arguments: 1, maximum_arguments: Some(1), description: "Converts the specified string to lower case." },
    BuiltinFunction { name: "toUpper", minimum_arguments: 1, maximum_arguments: Some(1), description: "Converts the specified string to upper case." },
    BuiltinFunction { name: "trim", minimum_arguments: 1, maximum_arguments: Some(1), description: "Removes all leading and trailing white-space characters from the specified string." },
    BuiltinFunction { name: "union", minimum_arguments: 2, maximum_arguments: None, description: "Returns a single array or object with all elements from the parameters." },
    BuiltinFunction { name: "uniqueString", minimum_arguments: 1, maximum_arguments: None, description: "Creates a deterministic hash string based on the values provided." },
    BuiltinFunction { name: "uri", minimum_arguments: 2, maximum_arguments: Some(2), description: "Creates an absolute URI by combining a base URI and a relative URI string." },
    BuiltinFunction { name: "utcNow", minimum_arguments: 0, maximum_arguments: Some(1), description: "Returns the current UTC datetime in the specified format." },
    BuiltinFunction { name: "variables", minimum_arguments: 1, maximum_arguments: Some(1), description: "Returns a variable value." },
];

/// Case-insensitive lookup into the built-in function table.
pub fn lookup(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTIN_FUNCTIONS
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(lookup("concat").is_some());
        assert!(lookup("CONCAT").is_some());
        assert!(lookup("ResourceGroup").is_some());
        assert!(lookup("nosuchfunction").is_none());
    }

    #[test]
    fn test_table_is_sorted_and_unique() {
        for pair in BUILTIN_FUNCTIONS.windows(2) {
            assert!(
                pair[0].name.to_ascii_lowercase() < pair[1].name.to_ascii_lowercase(),
                "{} should sort before {}",
                pair[0].name,
                pair[1].name
            );
        }
    }

    #[test]
    fn test_argument_bounds_are_consistent() {
        for function in BUILTIN_FUNCTIONS {
            if let Some(maximum) = function.maximum_arguments {
                assert!(
                    function.minimum_arguments <= maximum,
                    "{} has inverted argument bounds",
                    function.name
                );
            }
        }
    }
}
