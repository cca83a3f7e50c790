include!(concat!(env!("OUT_DIR"), "/build_information.rs"));

fn main() {
    println!("Build at: {}", BuildInformation::BuildAt);
    println!("Platform: {}", BuildInformation::Platform);
    println!("Warning level: {}", BuildInformation::WarningLevel);
    println!("Configuration: {}", BuildInformation::Configuration);
    println!("Assembly version: {}", BuildInformation::AssemblyVersion);
    println!("Assembly file version: {}", BuildInformation::AssemblyFileVersion);
    println!("Assembly name: {}", BuildInformation::AssemblyName);
    println!("Assembly copyright: {}", BuildInformation::AssemblyCopyright);
    println!("Assembly company: {}", BuildInformation::AssemblyCompany);
    println!("Target framework moniker: {}", BuildInformation::TargetFrameworkMoniker);
    println!("Nullability: {}", BuildInformation::Nullability);
    println!("Deterministic build: {}", BuildInformation::Deterministic);
    println!("Analysis level: {}", BuildInformation::AnalysisLevel);
    println!("Project directory: {}", BuildInformation::ProjectDirectory);
    println!("Language: {}", BuildInformation::Language);
    println!("Language version: {}", BuildInformation::LanguageVersion);
    println!("Release build: {}", BuildInformation::IsReleaseBuild);
    println!("Compiler version: {}", BuildInformation::CompilerVersion);
    println!("SDK version: {}", BuildInformation::DotNetSdkVersion);
}
